//! Crate-wide error categorization, following the four kinds from the
//! design: transient-remote, missing-data, malformed-payload, fatal.
//! Individual modules define their own leaf error enums (as the teacher
//! does in `storage.rs`/`keys.rs`); this module only adds the
//! `error_codes::ErrorCode` derive so every error can be logged with a
//! stable, greppable code.

use error_codes::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error, ErrorCode)]
pub enum HotStoreError {
    #[error("hot store connection error: {0}")]
    Connection(String),
    #[error("hot store returned malformed payload for key {key}")]
    MalformedPayload { key: String },
}

#[derive(Debug, Error, ErrorCode)]
pub enum RelationalError {
    #[error("database error: {0}")]
    Database(String),
    #[error("session {0} not found")]
    SessionNotFound(i64),
}

#[derive(Debug, Error, ErrorCode)]
pub enum AiError {
    #[error("network error calling AI service: {0}")]
    Network(String),
    #[error("AI service returned non-2xx status: {0}")]
    Status(u16),
    #[error("failed to decode AI service response: {0}")]
    Decode(String),
}

#[derive(Debug, Error, ErrorCode)]
pub enum LobbyManagerError {
    #[error("lobby {0} not found")]
    LobbyNotFound(u32),
    #[error(transparent)]
    HotStore(#[from] HotStoreError),
    #[error(transparent)]
    Relational(#[from] RelationalError),
}

/// Errors a phase handler cannot absorb itself. AI failures are never
/// included here: they are caught and degraded to fallback behavior at the
/// call site, per-lobby, and never stop the phase.
#[derive(Debug, Error, ErrorCode)]
pub enum PhaseError {
    #[error(transparent)]
    HotStore(#[from] HotStoreError),
    #[error(transparent)]
    Relational(#[from] RelationalError),
    #[error(transparent)]
    LobbyManager(#[from] LobbyManagerError),
}

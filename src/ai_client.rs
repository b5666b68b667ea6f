//! C2: request/response to the external decision oracle.
//!
//! Both operations honor a per-call deadline and never retry internally;
//! callers decide fallback semantics (see `phases::round` and
//! `phases::elimination`).

use async_trait::async_trait;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::domain::{EliminatedPlayer, LobbyId, SessionId};
use crate::error::AiError;
use crate::metrics;

#[derive(Clone, Debug, PartialEq, Eq, Parser)]
#[group(skip)]
pub struct Options {
    /// Base URL of the AI decision service.
    #[clap(long, env, default_value = "http://127.0.0.1:4000")]
    pub ai_api_base_url: Url,

    /// Per-call deadline for AI requests, in seconds.
    #[clap(long, env, default_value = "30")]
    pub ai_call_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EliminationDecision {
    pub eliminated: Vec<EliminatedPlayer>,
    pub success: bool,
}

#[derive(Debug, Deserialize)]
struct RoundAnnouncementResponse {
    data: String,
}

#[derive(Debug, Serialize)]
struct DecideEliminationsRequest<'a> {
    agent_id: &'a str,
    session_id: i64,
    lobby_id: u32,
    max_rounds: u32,
    current_round: u32,
}

#[derive(Debug, Deserialize)]
struct DecideEliminationsResponse {
    response: Vec<EliminatedPlayer>,
    success: bool,
}

#[async_trait]
pub trait AiClient: Send + Sync {
    async fn round_announcement(&self, agent_id: &str, round_number: u32)
        -> Result<String, AiError>;

    async fn decide_eliminations(
        &self,
        agent_id: &str,
        session_id: SessionId,
        lobby_id: LobbyId,
        max_rounds: u32,
        current_round: u32,
    ) -> Result<EliminationDecision, AiError>;
}

pub struct HttpAiClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpAiClient {
    #[must_use]
    pub fn new(options: &Options) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: options.ai_api_base_url.clone(),
            timeout: Duration::from_secs(options.ai_call_timeout_secs),
        }
    }

    async fn round_announcement_inner(
        &self,
        agent_id: &str,
        round_number: u32,
    ) -> Result<String, AiError> {
        let url = self
            .base_url
            .join(&format!("/{agent_id}/roundAnnouncement/{round_number}"))
            .map_err(|e| AiError::Network(e.to_string()))?;

        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AiError::Status(response.status().as_u16()));
        }

        let body: RoundAnnouncementResponse = response
            .json()
            .await
            .map_err(|e| AiError::Decode(e.to_string()))?;
        Ok(body.data)
    }

    async fn decide_eliminations_inner(
        &self,
        agent_id: &str,
        session_id: SessionId,
        lobby_id: LobbyId,
        max_rounds: u32,
        current_round: u32,
    ) -> Result<EliminationDecision, AiError> {
        let url = self
            .base_url
            .join("/decideEliminations")
            .map_err(|e| AiError::Network(e.to_string()))?;

        let body = DecideEliminationsRequest {
            agent_id,
            session_id: session_id.0,
            lobby_id: lobby_id.0,
            max_rounds,
            current_round,
        };

        let response = self
            .http
            .post(url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AiError::Status(response.status().as_u16()));
        }

        let body: DecideEliminationsResponse = response
            .json()
            .await
            .map_err(|e| AiError::Decode(e.to_string()))?;

        Ok(EliminationDecision {
            eliminated: body.response,
            success: body.success,
        })
    }
}

#[async_trait]
impl AiClient for HttpAiClient {
    async fn round_announcement(
        &self,
        agent_id: &str,
        round_number: u32,
    ) -> Result<String, AiError> {
        let timer = metrics::AI_CALL_LATENCY_SECONDS
            .with_label_values(&["round_announcement"])
            .start_timer();
        let result = self.round_announcement_inner(agent_id, round_number).await;
        timer.observe_duration();
        if result.is_err() {
            metrics::AI_CALL_FAILURES.with_label_values(&["round_announcement"]).inc();
        }
        result
    }

    async fn decide_eliminations(
        &self,
        agent_id: &str,
        session_id: SessionId,
        lobby_id: LobbyId,
        max_rounds: u32,
        current_round: u32,
    ) -> Result<EliminationDecision, AiError> {
        let timer = metrics::AI_CALL_LATENCY_SECONDS
            .with_label_values(&["decide_eliminations"])
            .start_timer();
        let result = self
            .decide_eliminations_inner(agent_id, session_id, lobby_id, max_rounds, current_round)
            .await;
        timer.observe_duration();
        if result.is_err() {
            metrics::AI_CALL_FAILURES.with_label_values(&["decide_eliminations"]).inc();
        }
        result
    }
}

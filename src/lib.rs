//! Session Orchestrator: a single, long-lived scheduler that drives the
//! time-based lifecycle of multi-round, multi-lobby group-decision
//! sessions. See the individual modules for the component breakdown.

use std::sync::Arc;

use clap::Parser;
use cli_batteries::await_shutdown;
use eyre::Result as EyreResult;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub mod ai_client;
pub mod broadcaster;
pub mod clock;
pub mod distributor;
pub mod domain;
pub mod error;
pub mod hotstore;
pub mod lease;
pub mod lobby_manager;
pub mod metrics;
pub mod phases;
pub mod relational;
pub mod selector;
pub mod timeline;
pub mod worker;

use ai_client::HttpAiClient;
use broadcaster::RedisBroadcaster;
use clock::Clock;
use hotstore::HotStore;
use lobby_manager::LobbyManager;
use phases::PhaseContext;
use relational::RelationalStore;
use selector::SessionSelector;
use worker::Worker;

#[derive(Clone, Debug, PartialEq, Eq, Parser)]
pub struct Options {
    #[clap(flatten)]
    pub ai_client: ai_client::Options,

    #[clap(flatten)]
    pub hot_store: hotstore::Options,

    #[clap(flatten)]
    pub relational: relational::Options,

    #[clap(flatten)]
    pub lease: lease::Options,

    /// Upper bound on concurrent AI calls issued within a single phase
    /// (e.g. `ELIMINATION_START` fanning out across lobbies).
    #[clap(long, env, default_value = "8")]
    pub max_concurrent_ai_calls: usize,
}

#[allow(clippy::missing_errors_doc)]
pub async fn async_main(options: Options) -> EyreResult<()> {
    info!("connecting to relational store, hot store, and AI service");

    let relational = RelationalStore::connect(&options.relational).await?;
    let hot_store = HotStore::connect(&options.hot_store).await?;
    let ai_client: Arc<dyn ai_client::AiClient> = Arc::new(HttpAiClient::new(&options.ai_client));
    let broadcaster: Arc<dyn broadcaster::Broadcaster> =
        Arc::new(RedisBroadcaster::new(hot_store.clone()));

    let cancellation = CancellationToken::new();
    tokio::spawn({
        let cancellation = cancellation.clone();
        async move {
            await_shutdown().await;
            info!("shutdown signal received, cancelling worker");
            cancellation.cancel();
        }
    });

    let clock = Clock::new(cancellation);
    let lobby_manager = LobbyManager::new(hot_store.clone());
    let selector = SessionSelector::new(relational.clone(), hot_store.clone());
    let phase_context = PhaseContext {
        relational,
        lobby_manager,
        store: hot_store,
        ai_client,
        broadcaster,
        max_concurrent_ai_calls: options.max_concurrent_ai_calls,
    };

    let worker = Worker::new(selector, clock, phase_context, options.lease);
    worker.run().await;
    Ok(())
}

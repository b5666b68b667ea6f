use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use session_orchestrator::hotstore::{self, HotStore};
use session_orchestrator::lobby_manager::LobbyManager;
use session_orchestrator::phases::PhaseContext;
use session_orchestrator::relational::{self, RelationalStore};
use sqlx::any::AnyPoolOptions;
use sqlx::Any;
use tempfile::TempDir;

use super::fakes::{FakeAiClient, FakeBroadcaster};

/// A single round's timestamps, all offsets from the session's `start_time`.
pub struct RoundSpec {
    pub ai_message_start: Duration,
    pub ai_message_end: Duration,
    pub start: Duration,
    pub end: Duration,
    pub elimination_start: Duration,
    pub elimination_end: Duration,
    pub voting_start: Duration,
    pub voting_end: Duration,
}

impl Default for RoundSpec {
    fn default() -> Self {
        Self {
            ai_message_start: Duration::seconds(0),
            ai_message_end: Duration::seconds(30),
            start: Duration::seconds(35),
            end: Duration::minutes(4),
            elimination_start: Duration::seconds(245),
            elimination_end: Duration::minutes(5),
            voting_start: Duration::seconds(305),
            voting_end: Duration::minutes(9),
        }
    }
}

/// Seeds a file-backed sqlite database (shared across every connection,
/// unlike `sqlite::memory:`, which hands each pooled connection its own
/// private database) with one session, one round, and the given wallets.
pub struct Harness {
    pub relational: RelationalStore,
    pub store: HotStore,
    pub lobby_manager: LobbyManager,
    pub ai_client: Arc<FakeAiClient>,
    pub broadcaster: Arc<FakeBroadcaster>,
    database_url: String,
    #[allow(dead_code)]
    temp_dir: TempDir,
}

impl Harness {
    /// Requires a reachable Redis at `REDIS_URL` (defaults to
    /// `redis://127.0.0.1:6379`); callers gate tests with `#[ignore]`.
    pub async fn seeded(session_id: i64, wallets: &[&str], round: RoundSpec) -> Self {
        let harness = Self::empty().await;

        let now = Utc::now();
        let start_time = now - Duration::seconds(1);
        let end_time = start_time + Duration::minutes(10);
        harness
            .insert_session(session_id, wallets, &round, start_time, end_time)
            .await;

        harness
            .store
            .purge_session(session_orchestrator::domain::SessionId(session_id), 1)
            .await
            .expect("purge any stale state from a previous run");
        harness
    }

    /// A database with the schema migrated but no sessions, for scenarios
    /// that announce a session only after the selector starts waiting.
    pub async fn empty() -> Self {
        let temp_dir = tempfile::tempdir().expect("tempdir");
        let db_path = temp_dir.path().join("test.db");
        let database_url = format!("sqlite://{}", db_path.display());

        let seed_pool: sqlx::Pool<Any> = AnyPoolOptions::new()
            .max_connections(1)
            .connect(&format!("{database_url}?mode=rwc"))
            .await
            .expect("create sqlite file");
        sqlx::migrate!("./migrations")
            .run(&seed_pool)
            .await
            .expect("run migrations");
        seed_pool.close().await;

        let relational_options = relational::Options {
            database_url: database_url.clone(),
            database_migrate: false,
            database_max_connections: 4,
        };
        let relational = RelationalStore::connect(&relational_options)
            .await
            .expect("connect relational store");

        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_owned());
        let store = HotStore::connect(&hotstore::Options { redis_url })
            .await
            .expect("connect hot store; set REDIS_URL or run redis-server locally");

        Self {
            relational,
            lobby_manager: LobbyManager::new(store.clone()),
            store,
            ai_client: Arc::new(FakeAiClient::new()),
            broadcaster: Arc::new(FakeBroadcaster::new()),
            database_url,
            temp_dir,
        }
    }

    /// Inserts a session directly into the shared sqlite file, bypassing
    /// `RelationalStore` (which is read-only by design).
    pub async fn insert_session(
        &self,
        session_id: i64,
        wallets: &[&str],
        round: &RoundSpec,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) {
        let pool: sqlx::Pool<Any> = AnyPoolOptions::new()
            .max_connections(1)
            .connect(&self.database_url)
            .await
            .expect("reopen sqlite file");
        seed_session(&pool, session_id, start_time, end_time).await;
        seed_round(&pool, session_id, 1, start_time, round).await;
        for wallet in wallets {
            seed_player(&pool, session_id, wallet, Utc::now()).await;
        }
        pool.close().await;
    }

    pub fn phase_context(&self) -> PhaseContext {
        PhaseContext {
            relational: self.relational.clone(),
            lobby_manager: self.lobby_manager.clone(),
            store: self.store.clone(),
            ai_client: self.ai_client.clone(),
            broadcaster: self.broadcaster.clone(),
            max_concurrent_ai_calls: 8,
        }
    }
}

async fn seed_session(
    pool: &sqlx::Pool<Any>,
    id: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) {
    sqlx::query(
        "INSERT INTO sessions (id, name, entry_fee, max_total_players, total_rounds, \
         start_time, end_time, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind("integration-test-session")
    .bind(0_i64)
    .bind(10_i64)
    .bind(1_i64)
    .bind(start_time)
    .bind(end_time)
    .bind(start_time)
    .execute(pool)
    .await
    .expect("insert session");
}

async fn seed_round(
    pool: &sqlx::Pool<Any>,
    session_id: i64,
    sequence_number: i64,
    start_time: DateTime<Utc>,
    spec: &RoundSpec,
) {
    sqlx::query(
        "INSERT INTO rounds (id, session_id, sequence_number, ai_message_start, \
         ai_message_end, start_time, end_time, elimination_start, elimination_end, \
         voting_start_time, voting_end_time) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(session_id)
    .bind(sequence_number)
    .bind(start_time + spec.ai_message_start)
    .bind(start_time + spec.ai_message_end)
    .bind(start_time + spec.start)
    .bind(start_time + spec.end)
    .bind(start_time + spec.elimination_start)
    .bind(start_time + spec.elimination_end)
    .bind(start_time + spec.voting_start)
    .bind(start_time + spec.voting_end)
    .execute(pool)
    .await
    .expect("insert round");
}

async fn seed_player(pool: &sqlx::Pool<Any>, session_id: i64, wallet: &str, joined_at: DateTime<Utc>) {
    sqlx::query(
        "INSERT INTO players (session_id, wallet_address, joined_at, status, \
         total_rounds_played) VALUES (?, ?, ?, 'ACTIVE', 0)",
    )
    .bind(session_id)
    .bind(wallet)
    .bind(joined_at)
    .execute(pool)
    .await
    .expect("insert player");
}

//! C11: the top-level driver tying the selector, timeline, clock, and phase
//! handlers together. `monitor` is restart-safe: it recomputes the timeline
//! from the current wall clock rather than resuming from saved progress.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::clock::{Clock, SleepOutcome};
use crate::domain::{PhaseKind, Session, SessionId};
use crate::lease::Lease;
use crate::metrics;
use crate::phases::{self, PhaseContext};
use crate::selector::SessionSelector;
use crate::timeline::Timeline;

const LEASE_ACQUIRE_RETRY: Duration = Duration::from_secs(5);

enum LeaseOutcome {
    NotRequired,
    Acquired(Lease),
    HeldElsewhere,
    ShuttingDown,
}

pub struct Worker {
    selector: SessionSelector,
    clock: Clock,
    phases: PhaseContext,
    completed: HashSet<SessionId>,
    lease_options: Option<crate::lease::Options>,
}

impl Worker {
    #[must_use]
    pub fn new(
        selector: SessionSelector,
        clock: Clock,
        phases: PhaseContext,
        lease_options: crate::lease::Options,
    ) -> Self {
        Self {
            selector,
            clock,
            phases,
            completed: HashSet::new(),
            lease_options: lease_options.enable_leader_election.then_some(lease_options),
        }
    }

    /// Runs until the clock's cancellation token fires.
    pub async fn run(mut self) {
        loop {
            if self.clock.is_cancelled() {
                info!("shutdown signal received, stopping worker loop");
                return;
            }

            let session = match self.selector.pick().await {
                Ok(session) => session,
                Err(error) => {
                    warn!(%error, "failed to select a session, retrying");
                    if self.clock.sleep_for(std::time::Duration::from_secs(5)).await == SleepOutcome::Cancelled {
                        return;
                    }
                    continue;
                }
            };

            if self.completed.contains(&session.id) {
                continue;
            }

            let lease = match self.acquire_lease(session.id).await {
                LeaseOutcome::NotRequired => None,
                LeaseOutcome::Acquired(lease) => Some(Arc::new(lease)),
                LeaseOutcome::ShuttingDown => return,
                LeaseOutcome::HeldElsewhere => continue,
            };

            let renewal = lease.clone().map(|lease| {
                let ttl_ms = self
                    .lease_options
                    .as_ref()
                    .map_or(15_000, |o| o.lease_ttl_ms);
                tokio::spawn(renew_lease_periodically(lease, Duration::from_millis(ttl_ms / 2)))
            });

            self.monitor(&session).await;

            if let Some(handle) = renewal {
                handle.abort();
            }
            if let Some(lease) = lease {
                if let Err(error) = lease.release().await {
                    warn!(%error, "failed to release leader-election lease");
                }
            }
            self.completed.insert(session.id);
        }
    }

    /// When leader election is enabled, retries acquiring the session's
    /// lease until it succeeds or this instance is cancelled; a competing
    /// holder means some other instance is already driving this session.
    async fn acquire_lease(&self, session_id: SessionId) -> LeaseOutcome {
        let Some(options) = &self.lease_options else {
            return LeaseOutcome::NotRequired;
        };
        let lease = Lease::new(
            self.phases.store.clone(),
            session_id,
            Duration::from_millis(options.lease_ttl_ms),
        );
        match lease.try_acquire().await {
            Ok(true) => LeaseOutcome::Acquired(lease),
            Ok(false) => LeaseOutcome::HeldElsewhere,
            Err(error) => {
                warn!(%error, "failed to contact hot store for lease acquisition");
                if self.clock.sleep_for(LEASE_ACQUIRE_RETRY).await == SleepOutcome::Cancelled {
                    LeaseOutcome::ShuttingDown
                } else {
                    LeaseOutcome::HeldElsewhere
                }
            }
        }
    }

    async fn monitor(&self, session: &Session) {
        loop {
            let now = chrono::Utc::now();
            let timeline = Timeline::build(session, now);
            let Some(event) = timeline.next_event(now).copied() else {
                return;
            };

            match self.clock.sleep_until(event.time).await {
                SleepOutcome::Cancelled => return,
                SleepOutcome::Reached | SleepOutcome::AlreadyPast => {}
            }

            let label = event.kind.as_label();
            let drift = (chrono::Utc::now() - event.time)
                .to_std()
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            metrics::SLEEP_DRIFT_SECONDS.with_label_values(&[label]).observe(drift);
            metrics::PHASES_DISPATCHED.with_label_values(&[label]).inc();

            if let Err(error) = phases::dispatch(&self.phases, session, &event).await {
                metrics::PHASE_FAILURES.with_label_values(&[label]).inc();
                warn!(session_id = %session.id, event_kind = ?event.kind, %error, "phase handler failed, advancing to next event");
            }

            if event.kind == PhaseKind::SessionEnd {
                return;
            }
        }
    }
}

async fn renew_lease_periodically(lease: Arc<Lease>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        if let Err(error) = lease.renew().await {
            warn!(%error, "failed to renew leader-election lease");
        }
    }
}

// src/query/poller.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::server::{QueryResult, ServerDetails};
use crate::query::aggregator::Aggregator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollPhase {
    Idle,
    Fetching,
    Success,
    Degraded,
}

/// What the dashboard renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub phase: PollPhase,
    pub result: Option<QueryResult>,
    pub last_update: Option<DateTime<Utc>>,
    /// Ticket of the fetch whose result is shown.
    pub sequence: u64,
}

impl StatusSnapshot {
    pub fn details(&self) -> Option<ServerDetails> {
        self.result.as_ref().map(ServerDetails::from)
    }
}

struct PollerState {
    snapshot: StatusSnapshot,
    settled: PollPhase,
    in_flight: usize,
}

struct Inner {
    aggregator: Aggregator,
    interval: Duration,
    state: RwLock<PollerState>,
    tickets: AtomicU64,
    cancel: CancellationToken,
}

/// Owns the current server status and keeps it fresh.
///
/// Fetches run on a fixed interval and on demand through [`refresh`]. They
/// are not de-duplicated; instead each takes a ticket and only a result
/// newer than the one on display is committed. After [`shutdown`] nothing is
/// committed any more.
///
/// [`refresh`]: StatusPoller::refresh
/// [`shutdown`]: StatusPoller::shutdown
#[derive(Clone)]
pub struct StatusPoller {
    inner: Arc<Inner>,
}

impl StatusPoller {
    pub fn new(aggregator: Aggregator, interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                aggregator,
                interval,
                state: RwLock::new(PollerState {
                    snapshot: StatusSnapshot {
                        phase: PollPhase::Idle,
                        result: None,
                        last_update: None,
                        sequence: 0,
                    },
                    settled: PollPhase::Idle,
                    in_flight: 0,
                }),
                tickets: AtomicU64::new(0),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.state.read().snapshot.clone()
    }

    pub fn spawn(&self) -> JoinHandle<()> {
        let poller = self.clone();
        tokio::spawn(async move { poller.run().await })
    }

    /// Timer loop: fetches immediately, then once per interval until shutdown.
    pub async fn run(&self) {
        let mut ticker = interval(self.inner.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Status polling every {:?}", self.inner.interval);

        loop {
            tokio::select! {
                _ = self.inner.cancel.cancelled() => break,
                _ = ticker.tick() => self.fetch_once().await,
            }
        }

        info!("Status polling stopped");
    }

    /// Runs one fetch right away and returns the snapshot afterwards.
    pub async fn refresh(&self) -> StatusSnapshot {
        self.fetch_once().await;
        self.snapshot()
    }

    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    #[cfg(test)]
    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    async fn fetch_once(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }

        let ticket = self.inner.tickets.fetch_add(1, Ordering::SeqCst) + 1;
        let _flight = InFlight::enter(&self.inner);
        debug!("Fetch {} started", ticket);

        match self.inner.aggregator.run(&self.inner.cancel).await {
            Ok(result) if !self.inner.cancel.is_cancelled() => self.commit(ticket, result),
            _ => debug!("Fetch {} cancelled", ticket),
        }
    }

    fn commit(&self, ticket: u64, result: QueryResult) {
        let mut state = self.inner.state.write();
        if ticket <= state.snapshot.sequence {
            debug!(
                "Discarding fetch {}, fetch {} is already on display",
                ticket, state.snapshot.sequence
            );
            return;
        }

        state.settled = if result.success {
            PollPhase::Success
        } else {
            PollPhase::Degraded
        };
        state.snapshot.sequence = ticket;
        state.snapshot.last_update = Some(result.timestamp);
        state.snapshot.result = Some(result);
    }
}

/// Marks one fetch as running. Dropping it, including when the fetching
/// future itself is dropped, takes the fetch off the count and restores the
/// settled phase once nothing else is running.
struct InFlight<'a> {
    inner: &'a Inner,
}

impl<'a> InFlight<'a> {
    fn enter(inner: &'a Inner) -> Self {
        let mut state = inner.state.write();
        state.in_flight += 1;
        state.snapshot.phase = PollPhase::Fetching;
        Self { inner }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.state.write();
        state.in_flight = state.in_flight.saturating_sub(1);
        state.snapshot.phase = if state.in_flight > 0 {
            PollPhase::Fetching
        } else {
            state.settled
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::aggregator::tests::{info, Behavior, Fake};
    use crate::query::fallback::FallbackMode;
    use crate::query::strategy::Strategy;
    use crate::query::QueryError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    // Answers successive calls with the queued (delay, map) pairs.
    struct Scripted {
        script: Mutex<VecDeque<(Duration, &'static str)>>,
    }

    #[async_trait]
    impl Strategy for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn query(&self) -> Result<QueryResult, QueryError> {
            let next = self.script.lock().pop_front();
            let (wait, map) = next.ok_or(QueryError::Status(500))?;
            tokio::time::sleep(wait).await;
            Ok(QueryResult::success("scripted", info(map, 1), vec![], vec![]))
        }
    }

    fn dynamic<S: Strategy + 'static>(strategy: Arc<S>) -> Arc<dyn Strategy> {
        strategy
    }

    fn poller(strategies: Vec<Arc<dyn Strategy>>, every: Duration) -> StatusPoller {
        let aggregator = Aggregator::new(strategies, Duration::from_secs(3), FallbackMode::Synthetic, "Srv");
        StatusPoller::new(aggregator, every)
    }

    #[tokio::test]
    async fn starts_idle() {
        let p = poller(vec![], Duration::from_secs(30));
        let snapshot = p.snapshot();
        assert_eq!(snapshot.phase, PollPhase::Idle);
        assert!(snapshot.result.is_none());
        assert!(snapshot.details().is_none());
    }

    #[tokio::test]
    async fn refresh_commits_success() {
        let source = Fake::new("ok", Behavior::Succeed { map: "de_inferno", players: 10 });
        let p = poller(vec![dynamic(source)], Duration::from_secs(30));

        let snapshot = p.refresh().await;
        assert_eq!(snapshot.phase, PollPhase::Success);
        assert_eq!(snapshot.sequence, 1);
        assert!(snapshot.last_update.is_some());
        let details = snapshot.details().unwrap();
        assert_eq!(details.current_map, "de_inferno");
        assert_eq!(details.player_count, 10);
    }

    #[tokio::test]
    async fn total_failure_is_degraded() {
        let p = poller(vec![dynamic(Fake::new("down", Behavior::Fail))], Duration::from_secs(30));

        let snapshot = p.refresh().await;
        assert_eq!(snapshot.phase, PollPhase::Degraded);
        let result = snapshot.result.unwrap();
        assert!(!result.success);
        assert!(result.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_fetch_does_not_overwrite_newer_one() {
        let source = Arc::new(Scripted {
            script: Mutex::new(VecDeque::from(vec![
                (Duration::from_millis(1000), "de_old"),
                (Duration::from_millis(100), "de_new"),
            ])),
        });
        let p = poller(vec![dynamic(source)], Duration::from_secs(3600));

        let slow = {
            let p = p.clone();
            tokio::spawn(async move { p.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let fast = p.refresh().await;
        assert_eq!(fast.result.as_ref().unwrap().server_info.map, "de_new");
        assert_eq!(fast.phase, PollPhase::Fetching);

        slow.await.unwrap();
        let settled = p.snapshot();
        assert_eq!(settled.result.unwrap().server_info.map, "de_new");
        assert_eq!(settled.sequence, 2);
        assert_eq!(settled.phase, PollPhase::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_the_interval_until_shutdown() {
        let source = Fake::new("ok", Behavior::Succeed { map: "de_dust2", players: 3 });
        let p = poller(vec![dynamic(source.clone())], Duration::from_secs(30));

        let handle = p.spawn();
        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(source.calls(), 3);

        p.shutdown();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_abandons_in_flight_fetch() {
        let p = poller(vec![dynamic(Fake::new("hang", Behavior::Hang))], Duration::from_secs(30));

        let handle = p.spawn();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(p.snapshot().phase, PollPhase::Fetching);

        p.shutdown();
        handle.await.unwrap();

        let snapshot = p.snapshot();
        assert!(snapshot.result.is_none());
        assert_eq!(snapshot.phase, PollPhase::Idle);
        assert!(p.is_shut_down());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_refresh_does_not_leave_phase_fetching() {
        let source = Arc::new(Scripted {
            script: Mutex::new(VecDeque::from(vec![
                (Duration::from_millis(1000), "de_abandoned"),
                (Duration::from_millis(50), "de_later"),
            ])),
        });
        let p = poller(vec![dynamic(source)], Duration::from_secs(3600));

        let abandoned = {
            let p = p.clone();
            tokio::spawn(async move { p.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(p.snapshot().phase, PollPhase::Fetching);

        abandoned.abort();
        assert!(abandoned.await.unwrap_err().is_cancelled());
        assert_eq!(p.snapshot().phase, PollPhase::Idle);

        let later = p.refresh().await;
        assert_eq!(later.phase, PollPhase::Success);
        assert_eq!(later.result.unwrap().server_info.map, "de_later");
    }

    #[tokio::test]
    async fn refresh_after_shutdown_commits_nothing() {
        let source = Fake::new("ok", Behavior::Succeed { map: "de_dust2", players: 3 });
        let p = poller(vec![dynamic(source.clone())], Duration::from_secs(30));
        p.shutdown();

        let snapshot = p.refresh().await;
        assert!(snapshot.result.is_none());
        assert_eq!(source.calls(), 0);
    }
}

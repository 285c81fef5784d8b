// src/query/aggregator.rs
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::models::server::QueryResult;
use crate::query::fallback::FallbackMode;
use crate::query::strategy::{default_strategies, Strategy};
use crate::query::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceMode {
    /// One source at a time, in list order.
    Sequential,
    /// Every source at once; the first success to arrive wins.
    Race,
}

impl FromStr for RaceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "race" | "concurrent" => Ok(Self::Race),
            other => Err(format!("unknown race mode: {}", other)),
        }
    }
}

/// Picks the first source that answers and degrades to the configured
/// fallback when none does.
pub struct Aggregator {
    strategies: Vec<Arc<dyn Strategy>>,
    attempt_timeout: Duration,
    fallback: FallbackMode,
    race_mode: RaceMode,
    server_name: String,
}

impl Aggregator {
    pub fn new(
        strategies: Vec<Arc<dyn Strategy>>,
        attempt_timeout: Duration,
        fallback: FallbackMode,
        server_name: impl Into<String>,
    ) -> Self {
        Self {
            strategies,
            attempt_timeout,
            fallback,
            race_mode: RaceMode::Sequential,
            server_name: server_name.into(),
        }
    }

    pub fn with_race_mode(mut self, race_mode: RaceMode) -> Self {
        self.race_mode = race_mode;
        self
    }

    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        Self::new(
            default_strategies(config, client),
            config.attempt_timeout(),
            config.fallback_mode,
            config.server_display_name.clone(),
        )
        .with_race_mode(config.race_mode)
    }

    pub fn race_mode(&self) -> RaceMode {
        self.race_mode
    }

    /// Runs one full fetch cycle.
    ///
    /// Only cancellation is reported as an error. Source failures end in the
    /// fallback result, which has `success == false` and the collected
    /// failure messages in `error`.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<QueryResult, QueryError> {
        let started = Instant::now();

        let outcome = match self.race_mode {
            RaceMode::Sequential => self.run_sequential(cancel).await,
            RaceMode::Race => self.run_race(cancel).await,
        };

        let mut result = match outcome {
            Ok(result) => result,
            Err(QueryError::Cancelled) => return Err(QueryError::Cancelled),
            Err(e) => {
                warn!("No source answered, using {:?} fallback: {}", self.fallback, e);
                self.fallback
                    .build(&self.server_name, e.to_string(), &mut rand::thread_rng())
            }
        };
        result.elapsed_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }

    async fn run_sequential(&self, cancel: &CancellationToken) -> Result<QueryResult, QueryError> {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            if cancel.is_cancelled() {
                return Err(QueryError::Cancelled);
            }
            debug!("Trying {}", strategy.name());

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(QueryError::Cancelled),
                outcome = attempt(strategy.as_ref(), self.attempt_timeout) => outcome,
            };

            match outcome {
                Ok(result) => {
                    info!("Server status received from {}", strategy.name());
                    return Ok(result);
                }
                Err(e) => {
                    debug!("{} failed: {}", strategy.name(), e);
                    failures.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        Err(exhausted(failures))
    }

    async fn run_race(&self, cancel: &CancellationToken) -> Result<QueryResult, QueryError> {
        let mut attempts = JoinSet::new();
        for (index, strategy) in self.strategies.iter().enumerate() {
            let strategy = Arc::clone(strategy);
            let limit = self.attempt_timeout;
            attempts.spawn(async move { (index, attempt(strategy.as_ref(), limit).await) });
        }

        let mut failures: Vec<Option<String>> = vec![None; self.strategies.len()];
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    attempts.abort_all();
                    return Err(QueryError::Cancelled);
                }
                joined = attempts.join_next() => joined,
            };

            match joined {
                None => break,
                Some(Ok((index, Ok(result)))) => {
                    info!("Server status received from {}", self.strategies[index].name());
                    attempts.abort_all();
                    return Ok(result);
                }
                Some(Ok((index, Err(e)))) => {
                    debug!("{} failed: {}", self.strategies[index].name(), e);
                    failures[index] = Some(format!("{}: {}", self.strategies[index].name(), e));
                }
                Some(Err(e)) => debug!("Source task ended abnormally: {}", e),
            }
        }

        Err(exhausted(failures.into_iter().flatten().collect()))
    }
}

async fn attempt(strategy: &dyn Strategy, limit: Duration) -> Result<QueryResult, QueryError> {
    match timeout(limit, strategy.query()).await {
        Ok(Ok(result)) if result.success => Ok(result),
        Ok(Ok(result)) => Err(QueryError::Shape(
            result
                .error
                .unwrap_or_else(|| "source reported failure".to_string()),
        )),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(QueryError::Timeout(limit.as_millis() as u64)),
    }
}

fn exhausted(failures: Vec<String>) -> QueryError {
    if failures.is_empty() {
        QueryError::Exhausted("no sources configured".to_string())
    } else {
        QueryError::Exhausted(failures.join("; "))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::server::{ServerInfo, ServerStatus, UNREACHABLE_PING};
    use crate::query::fallback::SYNTHETIC_SOURCE;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    pub(crate) enum Behavior {
        Fail,
        Reject,
        Succeed { map: &'static str, players: u32 },
        Hang,
        Delay(Duration, &'static str),
    }

    pub(crate) struct Fake {
        name: String,
        behavior: Behavior,
        pub(crate) calls: Arc<AtomicUsize>,
    }

    impl Fake {
        pub(crate) fn new(name: &str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                behavior,
                calls: Arc::new(AtomicUsize::new(0)),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    pub(crate) fn info(map: &str, players: u32) -> ServerInfo {
        ServerInfo {
            name: "Fake".to_string(),
            map: map.to_string(),
            players,
            max_players: 32,
            ping: 20,
            status: ServerStatus::Online,
        }
    }

    #[async_trait]
    impl Strategy for Fake {
        fn name(&self) -> &str {
            &self.name
        }

        async fn query(&self) -> Result<QueryResult, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Fail => Err(QueryError::Status(503)),
                Behavior::Reject => {
                    let mut result = QueryResult::success(self.name.clone(), info("x", 0), vec![], vec![]);
                    result.success = false;
                    Ok(result)
                }
                Behavior::Succeed { map, players } => Ok(QueryResult::success(
                    self.name.clone(),
                    info(map, *players),
                    vec![],
                    vec![],
                )),
                Behavior::Hang => std::future::pending().await,
                Behavior::Delay(wait, map) => {
                    tokio::time::sleep(*wait).await;
                    Ok(QueryResult::success(self.name.clone(), info(map, 1), vec![], vec![]))
                }
            }
        }
    }

    fn aggregator(strategies: Vec<Arc<Fake>>, fallback: FallbackMode) -> Aggregator {
        let strategies = strategies
            .into_iter()
            .map(|s| s as Arc<dyn Strategy>)
            .collect();
        Aggregator::new(strategies, Duration::from_millis(3000), fallback, "Srv")
    }

    #[tokio::test]
    async fn first_success_wins_and_later_sources_are_skipped() {
        let a = Fake::new("a", Behavior::Fail);
        let b = Fake::new("b", Behavior::Fail);
        let c = Fake::new("c", Behavior::Succeed { map: "de_inferno", players: 10 });
        let d = Fake::new("d", Behavior::Succeed { map: "de_nuke", players: 3 });

        let agg = aggregator(vec![a.clone(), b.clone(), c.clone(), d.clone()], FallbackMode::Synthetic);
        let result = agg.run(&CancellationToken::new()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.source, "c");
        assert_eq!(result.server_info.map, "de_inferno");
        assert_eq!(result.server_info.players, 10);
        assert_eq!((a.calls(), b.calls(), c.calls(), d.calls()), (1, 1, 1, 0));
    }

    #[tokio::test]
    async fn non_success_results_are_skipped() {
        let a = Fake::new("a", Behavior::Reject);
        let b = Fake::new("b", Behavior::Succeed { map: "de_aztec", players: 2 });

        let agg = aggregator(vec![a, b], FallbackMode::Synthetic);
        let result = agg.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(result.source, "b");
    }

    #[tokio::test]
    async fn all_failing_degrades_with_diagnostic() {
        let agg = aggregator(
            vec![Fake::new("a", Behavior::Fail), Fake::new("b", Behavior::Fail)],
            FallbackMode::Synthetic,
        );
        let result = agg.run(&CancellationToken::new()).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.source, SYNTHETIC_SOURCE);
        let message = result.error.unwrap();
        assert!(message.contains("a: "));
        assert!(message.contains("b: "));
    }

    #[tokio::test]
    async fn offline_fallback_reports_unreachable() {
        let agg = aggregator(vec![Fake::new("a", Behavior::Fail)], FallbackMode::Offline);
        let result = agg.run(&CancellationToken::new()).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.server_info.ping, UNREACHABLE_PING);
        assert!(result.players.is_empty());
    }

    #[tokio::test]
    async fn empty_source_list_still_degrades() {
        let agg = aggregator(vec![], FallbackMode::Offline);
        let result = agg.run(&CancellationToken::new()).await.unwrap();
        assert!(!result.success);
        assert!(!result.error.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_source_is_abandoned_at_the_timeout() {
        let hang = Fake::new("hang", Behavior::Hang);
        let next = Fake::new("next", Behavior::Succeed { map: "de_train", players: 4 });

        let agg = aggregator(vec![hang.clone(), next.clone()], FallbackMode::Synthetic);
        let started = Instant::now();
        let result = agg.run(&CancellationToken::new()).await.unwrap();
        let waited = started.elapsed();

        assert_eq!(result.source, "next");
        assert!(waited >= Duration::from_millis(3000));
        assert!(waited < Duration::from_millis(3100));
        assert!(result.elapsed_ms >= 3000);
        assert_eq!((hang.calls(), next.calls()), (1, 1));
    }

    #[tokio::test]
    async fn cancelled_run_invokes_nothing() {
        let a = Fake::new("a", Behavior::Succeed { map: "de_dust", players: 1 });
        let agg = aggregator(vec![a.clone()], FallbackMode::Synthetic);

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(agg.run(&cancel).await, Err(QueryError::Cancelled)));
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_mid_attempt_stops_the_run() {
        let agg = aggregator(vec![Fake::new("hang", Behavior::Hang)], FallbackMode::Synthetic);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        assert!(matches!(agg.run(&cancel).await, Err(QueryError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn race_mode_takes_the_fastest_success() {
        let slow = Fake::new("slow", Behavior::Delay(Duration::from_millis(2000), "de_slow"));
        let failing = Fake::new("failing", Behavior::Fail);
        let fast = Fake::new("fast", Behavior::Delay(Duration::from_millis(100), "de_fast"));

        let agg = aggregator(vec![slow, failing, fast], FallbackMode::Synthetic).with_race_mode(RaceMode::Race);
        let started = Instant::now();
        let result = agg.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(result.source, "fast");
        assert_eq!(result.server_info.map, "de_fast");
        assert!(started.elapsed() < Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn race_mode_bounds_total_failure_by_one_timeout() {
        let agg = aggregator(
            vec![Fake::new("h1", Behavior::Hang), Fake::new("h2", Behavior::Hang), Fake::new("f", Behavior::Fail)],
            FallbackMode::Offline,
        )
        .with_race_mode(RaceMode::Race);

        let started = Instant::now();
        let result = agg.run(&CancellationToken::new()).await.unwrap();

        assert!(!result.success);
        assert!(started.elapsed() < Duration::from_millis(3100));
        let message = result.error.unwrap();
        assert!(message.contains("h1: Timed out after 3000 ms"));
        assert!(message.contains("f: "));
    }

    #[test]
    fn parses_race_mode() {
        assert_eq!("race".parse::<RaceMode>(), Ok(RaceMode::Race));
        assert_eq!("SEQUENTIAL".parse::<RaceMode>(), Ok(RaceMode::Sequential));
        assert!("fastest".parse::<RaceMode>().is_err());
    }
}

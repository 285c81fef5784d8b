use std::env;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use governor::Quota;

use crate::query::aggregator::RaceMode;
use crate::query::fallback::FallbackMode;

pub const DEFAULT_SERVER_NAME: &str = "РЕАЛЬНЫЕ ПАЦАНЫ ИЗ 90-х [PUBLIC PRO] v34";

#[derive(Clone, Debug)]
pub struct Config {
    // HTTP listener
    pub bind_address: String,
    pub port: u16,

    // The game server being watched
    pub game_server_ip: String,
    pub game_server_port: u16,
    pub myarena_game_id: u32,
    pub server_display_name: String,

    // Polling
    pub poll_interval_secs: u64,
    pub attempt_timeout_ms: u64,
    pub ping_timeout_ms: u64,
    pub fallback_mode: FallbackMode,
    pub race_mode: RaceMode,

    // Rate limiting configs
    pub refresh_period_secs: u64,
    pub refresh_burst_limit: u32,
    pub forum_write_period_secs: u64,
    pub forum_write_burst_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            game_server_ip: "45.136.205.92".to_string(),
            game_server_port: 27015,
            myarena_game_id: 110421,
            server_display_name: DEFAULT_SERVER_NAME.to_string(),
            poll_interval_secs: 30,
            attempt_timeout_ms: 3000,
            ping_timeout_ms: 2000,
            fallback_mode: FallbackMode::Synthetic,
            race_mode: RaceMode::Sequential,
            refresh_period_secs: 5,
            refresh_burst_limit: 2,
            forum_write_period_secs: 2,
            forum_write_burst_limit: 10,
        }
    }
}

fn var_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: var_or("BIND_ADDRESS", defaults.bind_address),
            port: var_or("PORT", defaults.port),

            game_server_ip: var_or("GAME_SERVER_IP", defaults.game_server_ip),
            game_server_port: var_or("GAME_SERVER_PORT", defaults.game_server_port),
            myarena_game_id: var_or("MYARENA_GAME_ID", defaults.myarena_game_id),
            server_display_name: var_or("SERVER_DISPLAY_NAME", defaults.server_display_name),

            poll_interval_secs: var_or("POLL_INTERVAL_SECS", defaults.poll_interval_secs).max(1),
            attempt_timeout_ms: var_or("ATTEMPT_TIMEOUT_MS", defaults.attempt_timeout_ms).max(1),
            ping_timeout_ms: var_or("PING_TIMEOUT_MS", defaults.ping_timeout_ms).max(1),
            fallback_mode: var_or("FALLBACK_MODE", defaults.fallback_mode),
            race_mode: var_or("RACE_MODE", defaults.race_mode),

            refresh_period_secs: var_or("REFRESH_PERIOD_SECS", defaults.refresh_period_secs),
            refresh_burst_limit: var_or("REFRESH_BURST_LIMIT", defaults.refresh_burst_limit),
            forum_write_period_secs: var_or("FORUM_WRITE_PERIOD_SECS", defaults.forum_write_period_secs),
            forum_write_burst_limit: var_or("FORUM_WRITE_BURST_LIMIT", defaults.forum_write_burst_limit),
        }
    }

    pub fn bind(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn game_server_address(&self) -> String {
        format!("{}:{}", self.game_server_ip, self.game_server_port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn refresh_quota(&self) -> Quota {
        quota(self.refresh_period_secs, self.refresh_burst_limit)
    }

    pub fn forum_write_quota(&self) -> Quota {
        quota(self.forum_write_period_secs, self.forum_write_burst_limit)
    }
}

// A zero period or burst falls back to one request per second.
fn quota(period_secs: u64, burst: u32) -> Quota {
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(Duration::from_secs(period_secs))
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(burst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_watched_server() {
        let config = Config::default();
        assert_eq!(config.game_server_address(), "45.136.205.92:27015");
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.attempt_timeout(), Duration::from_millis(3000));
        assert_eq!(config.fallback_mode, FallbackMode::Synthetic);
        assert_eq!(config.race_mode, RaceMode::Sequential);
    }

    #[test]
    fn zero_period_quota_does_not_panic() {
        let _ = quota(0, 0);
        let _ = Config::default().refresh_quota();
    }
}

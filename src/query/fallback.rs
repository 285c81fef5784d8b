// src/query/fallback.rs
use std::str::FromStr;

use chrono::Utc;
use rand::Rng;
use serde::Serialize;

use crate::models::server::{Player, QueryResult, Rule, ServerInfo, ServerStatus, UNREACHABLE_PING};
use crate::query::normalize::{format_play_time, sort_by_score, DEFAULT_MAP, DEFAULT_MAX_PLAYERS};

pub const SYNTHETIC_SOURCE: &str = "Synthetic";
pub const OFFLINE_SOURCE: &str = "Fallback";

const PLAYER_NAMES: [&str; 10] = [
    "ProGamer2000",
    "HeadShot_King",
    "CSS_Legend",
    "NoobSlayer",
    "Admin_Vitalik",
    "WarriorXX",
    "SniperElite",
    "RushB_Master",
    "FragHunter",
    "TopPlayer",
];

const RULES: [(&str, &str); 6] = [
    ("mp_friendlyfire", "0"),
    ("mp_autoteambalance", "1"),
    ("mp_maxrounds", "30"),
    ("sv_gravity", "800"),
    ("mp_timelimit", "0"),
    ("mp_fraglimit", "0"),
];

/// What the aggregator hands back once every source has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// Plausible fabricated numbers, for a dashboard that never looks empty.
    Synthetic,
    /// An explicit offline placeholder.
    Offline,
}

impl FromStr for FallbackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "synthetic" | "mock" => Ok(Self::Synthetic),
            "offline" => Ok(Self::Offline),
            other => Err(format!("unknown fallback mode: {}", other)),
        }
    }
}

impl FallbackMode {
    /// Builds the degraded result. It is never marked successful and always
    /// carries `diagnostic` so callers can tell it apart from real data.
    pub fn build<R: Rng>(self, server_name: &str, diagnostic: String, rng: &mut R) -> QueryResult {
        let (source, server_info, players, rules) = match self {
            Self::Synthetic => {
                let (info, players) = synthetic_server(server_name, rng);
                let rules = RULES.iter().map(|(k, v)| Rule::new(*k, *v)).collect();
                (SYNTHETIC_SOURCE, info, players, rules)
            }
            Self::Offline => (OFFLINE_SOURCE, offline_server(server_name), Vec::new(), Vec::new()),
        };

        QueryResult {
            server_info,
            players,
            rules,
            success: false,
            error: Some(diagnostic),
            source: source.to_string(),
            timestamp: Utc::now(),
            elapsed_ms: 0,
        }
    }
}

fn synthetic_server<R: Rng>(server_name: &str, rng: &mut R) -> (ServerInfo, Vec<Player>) {
    let player_count: u32 = rng.gen_range(5..25);

    let mut players: Vec<Player> = (0..player_count as usize)
        .map(|i| {
            let name = PLAYER_NAMES
                .get(i)
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("Player_{}", i + 1));
            let frags: u32 = rng.gen_range(5..55);
            let seconds: u64 = rng.gen_range(300..7500);
            Player {
                name,
                score: frags as i32,
                kills: frags,
                deaths: rng.gen_range(0..30),
                ping: rng.gen_range(10..110),
                time: format_play_time(seconds),
            }
        })
        .collect();
    sort_by_score(&mut players);

    let info = ServerInfo {
        name: server_name.to_string(),
        map: DEFAULT_MAP.to_string(),
        players: player_count,
        max_players: DEFAULT_MAX_PLAYERS,
        ping: rng.gen_range(10..110),
        status: ServerStatus::Online,
    };
    (info, players)
}

fn offline_server(server_name: &str) -> ServerInfo {
    ServerInfo {
        name: server_name.to_string(),
        map: DEFAULT_MAP.to_string(),
        players: 0,
        max_players: DEFAULT_MAX_PLAYERS,
        ping: UNREACHABLE_PING,
        status: ServerStatus::Offline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn synthetic_data_is_plausible_and_flagged() {
        let mut rng = StdRng::seed_from_u64(42);
        let result = FallbackMode::Synthetic.build("Srv", "nothing answered".to_string(), &mut rng);

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("nothing answered"));
        assert_eq!(result.source, SYNTHETIC_SOURCE);
        assert!((5..25).contains(&result.server_info.players));
        assert_eq!(result.players.len() as u32, result.server_info.players);
        assert!(result.players.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(result.rules.len(), 6);
    }

    #[test]
    fn offline_placeholder_uses_sentinel_ping() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = FallbackMode::Offline.build("Srv", "down".to_string(), &mut rng);

        assert!(!result.success);
        assert_eq!(result.source, OFFLINE_SOURCE);
        assert_eq!(result.server_info.ping, UNREACHABLE_PING);
        assert_eq!(result.server_info.status, ServerStatus::Offline);
        assert!(result.players.is_empty());
    }

    #[test]
    fn parses_mode_names() {
        assert_eq!("offline".parse::<FallbackMode>(), Ok(FallbackMode::Offline));
        assert_eq!(" Synthetic ".parse::<FallbackMode>(), Ok(FallbackMode::Synthetic));
        assert!("bogus".parse::<FallbackMode>().is_err());
    }
}

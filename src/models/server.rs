// src/models/server.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ping reported for a server nobody could reach.
pub const UNREACHABLE_PING: u32 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub name: String,
    pub map: String,
    pub players: u32,
    pub max_players: u32,
    pub ping: u32,
    pub status: ServerStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub score: i32,
    pub kills: u32,
    pub deaths: u32,
    pub ping: u32,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub key: String,
    pub value: String,
}

impl Rule {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// One complete answer from the aggregator. Replaced wholesale on every fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub server_info: ServerInfo,
    pub players: Vec<Player>,
    pub rules: Vec<Rule>,
    pub success: bool,
    pub error: Option<String>,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl QueryResult {
    pub fn success(
        source: impl Into<String>,
        server_info: ServerInfo,
        players: Vec<Player>,
        rules: Vec<Rule>,
    ) -> Self {
        Self {
            server_info,
            players,
            rules,
            success: true,
            error: None,
            source: source.into(),
            timestamp: Utc::now(),
            elapsed_ms: 0,
        }
    }
}

/// Condensed view of a result for the status badge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDetails {
    pub is_online: bool,
    pub response_time_ms: u64,
    pub player_count: u32,
    pub server_name: String,
    pub current_map: String,
}

impl From<&QueryResult> for ServerDetails {
    fn from(result: &QueryResult) -> Self {
        Self {
            is_online: result.success
                && result.error.is_none()
                && result.server_info.status == ServerStatus::Online,
            response_time_ms: result.elapsed_ms,
            player_count: result.server_info.players,
            server_name: result.server_info.name.clone(),
            current_map: result.server_info.map.clone(),
        }
    }
}

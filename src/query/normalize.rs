// src/query/normalize.rs
use rand::Rng;

use crate::models::server::{Player, Rule, ServerInfo, ServerStatus};
use crate::query::payload::{
    A2sPayload, BattleMetricsPayload, GameToolsPayload, GenericPayload, LenientInt, MyArenaPayload,
    PlayersField, RawPlayer, SourcePayload, SteamPayload,
};
use crate::query::QueryError;

pub const DEFAULT_MAP: &str = "de_dust2";
pub const DEFAULT_MAX_PLAYERS: u32 = 32;
pub const DEFAULT_SERVER_PING: u32 = 15;

/// Canonical representation of one source response.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub server_info: ServerInfo,
    pub players: Vec<Player>,
    pub rules: Vec<Rule>,
}

/// Maps a decoded payload onto `ServerInfo` / `Player[]` / `Rule[]`.
///
/// Missing fields never fail: each has a default, with player pings drawn
/// from `rng`. Only a payload without its top-level server entry is rejected.
/// The returned players are sorted by score, highest first, keeping source
/// order for equal scores.
pub fn normalize<R: Rng>(
    payload: &SourcePayload,
    server_name: &str,
    rng: &mut R,
) -> Result<Normalized, QueryError> {
    let mut normalized = match payload {
        SourcePayload::MyArena(p) => my_arena(p, server_name, rng),
        SourcePayload::A2s(p) => a2s(p, server_name, rng)?,
        SourcePayload::GameTools(p) => game_tools(p, server_name, rng),
        SourcePayload::BattleMetrics(p) => battle_metrics(p, server_name)?,
        SourcePayload::Steam(p) => steam(p, server_name)?,
        SourcePayload::Generic(p) => generic(p, server_name, rng),
    };
    sort_by_score(&mut normalized.players);
    Ok(normalized)
}

pub fn sort_by_score(players: &mut [Player]) {
    // sort_by is stable, ties keep source order
    players.sort_by(|a, b| b.score.cmp(&a.score));
}

/// `H:MM:SS` from one hour up, `M:SS` below.
pub fn format_play_time(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

fn my_arena<R: Rng>(p: &MyArenaPayload, server_name: &str, rng: &mut R) -> Normalized {
    let online = !matches!(p.online, Some(serde_json::Value::Bool(false)));
    let server_info = ServerInfo {
        name: p.name.or(&p.hostname).unwrap_or(server_name).to_string(),
        map: map_or_default(p.map.get()),
        players: count(p.players.get().or(p.numplayers.get())),
        max_players: max_players(&[p.maxplayers]),
        ping: server_ping(p.ping),
        status: if online { ServerStatus::Online } else { ServerStatus::Offline },
    };

    let list = p.players_list_camel.get().or(p.players_list.get()).unwrap_or_default();
    Normalized {
        server_info,
        players: players_from(list, false, rng),
        rules: Vec::new(),
    }
}

fn a2s<R: Rng>(
    p: &A2sPayload,
    server_name: &str,
    rng: &mut R,
) -> Result<Normalized, QueryError> {
    let info = p
        .info
        .as_ref()
        .ok_or_else(|| QueryError::Shape("query proxy response has no info object".to_string()))?;

    let name = info
        .name
        .get()
        .or(info.host_name.get())
        .or(info.hostname.get())
        .unwrap_or(server_name);
    let server_info = ServerInfo {
        name: name.to_string(),
        map: map_or_default(info.map.or(&info.map_upper)),
        players: count(info.players.get().or(info.players_upper.get())),
        max_players: max_players(&[info.max_players, info.maxplayers, info.max_players_upper]),
        ping: server_ping(p.ping),
        status: ServerStatus::Online,
    };

    Ok(Normalized {
        server_info,
        players: players_from(p.players.get().unwrap_or_default(), false, rng),
        rules: p.rules.0.clone(),
    })
}

fn game_tools<R: Rng>(p: &GameToolsPayload, server_name: &str, rng: &mut R) -> Normalized {
    let server_info = ServerInfo {
        name: p.name.get().unwrap_or(server_name).to_string(),
        map: map_or_default(p.map.get()),
        players: count(p.numplayers.get()),
        max_players: max_players(&[p.maxplayers]),
        ping: server_ping(p.ping),
        status: if p.numplayers.is_present() {
            ServerStatus::Online
        } else {
            ServerStatus::Offline
        },
    };

    Normalized {
        server_info,
        players: players_from(p.players.get().unwrap_or_default(), true, rng),
        rules: Vec::new(),
    }
}

fn battle_metrics(p: &BattleMetricsPayload, server_name: &str) -> Result<Normalized, QueryError> {
    let attributes = p
        .data
        .first()
        .and_then(|server| server.attributes.as_ref())
        .ok_or_else(|| QueryError::Shape("server not found in BattleMetrics response".to_string()))?;

    let online = attributes.status.get() == Some("online");
    let server_info = ServerInfo {
        name: attributes.name.get().unwrap_or(server_name).to_string(),
        map: map_or_default(attributes.details.map.get()),
        players: count(attributes.players.get()),
        max_players: max_players(&[attributes.max_players]),
        ping: DEFAULT_SERVER_PING,
        status: if online { ServerStatus::Online } else { ServerStatus::Offline },
    };

    Ok(Normalized { server_info, players: Vec::new(), rules: Vec::new() })
}

fn steam(p: &SteamPayload, server_name: &str) -> Result<Normalized, QueryError> {
    let server = p
        .response
        .as_ref()
        .and_then(|response| response.servers.first())
        .ok_or_else(|| QueryError::Shape("server not found in Steam response".to_string()))?;

    let server_info = ServerInfo {
        name: server.name.get().unwrap_or(server_name).to_string(),
        map: map_or_default(server.map.get()),
        players: count(server.players.get()),
        max_players: max_players(&[server.max_players]),
        ping: DEFAULT_SERVER_PING,
        status: ServerStatus::Online,
    };

    Ok(Normalized { server_info, players: Vec::new(), rules: Vec::new() })
}

fn generic<R: Rng>(p: &GenericPayload, server_name: &str, rng: &mut R) -> Normalized {
    let (listed, counted) = match &p.players {
        PlayersField::List(list) => (Some(list.as_slice()), None),
        PlayersField::Count(c) => (None, c.get()),
    };
    let list = p.player_list.get().or(listed).unwrap_or_default();
    let player_count = counted
        .or(p.numplayers.get())
        .unwrap_or(listed.map_or(0, |l| l.len() as i64));

    let server_info = ServerInfo {
        name: p.hostname.or(&p.name).unwrap_or(server_name).to_string(),
        map: map_or_default(p.map.get()),
        players: count(Some(player_count)),
        max_players: max_players(&[p.maxplayers, p.max_players]),
        ping: server_ping(p.ping),
        status: ServerStatus::Online,
    };

    Normalized {
        server_info,
        players: players_from(list, false, rng),
        rules: Vec::new(),
    }
}

// GameTools omits kills/deaths; they are estimated from the score there.
fn players_from<R: Rng>(list: &[RawPlayer], estimate_from_score: bool, rng: &mut R) -> Vec<Player> {
    list.iter()
        .enumerate()
        .map(|(index, raw)| player(index, raw, estimate_from_score, rng))
        .collect()
}

fn player<R: Rng>(index: usize, raw: &RawPlayer, estimate_from_score: bool, rng: &mut R) -> Player {
    let name = raw
        .name
        .get()
        .or(raw.name_upper.get())
        .or(raw.nick.get())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Player_{}", index + 1));

    let score = raw
        .score
        .get()
        .or(raw.frags.get())
        .or(raw.frags_upper.get())
        .unwrap_or(0);
    let frags = raw.frags.get().or(raw.frags_upper.get());

    let (kills, deaths) = if estimate_from_score {
        (raw.kills.get().unwrap_or(score / 2), raw.deaths.get().unwrap_or(score / 3))
    } else {
        (raw.kills.get().or(frags).unwrap_or(0), raw.deaths.get().unwrap_or(0))
    };

    let seconds = raw
        .time
        .get()
        .or(raw.time_upper.get())
        .or(raw.duration.get())
        .unwrap_or(0)
        .max(0) as u64;

    let ping = match raw.ping.non_zero() {
        Some(ping) => count(Some(ping)),
        None => rng.gen_range(10..110),
    };

    Player {
        name,
        score: score.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
        kills: count(Some(kills)),
        deaths: count(Some(deaths)),
        ping,
        time: format_play_time(seconds),
    }
}

fn count(value: Option<i64>) -> u32 {
    value.unwrap_or(0).clamp(0, u32::MAX as i64) as u32
}

fn max_players(candidates: &[LenientInt]) -> u32 {
    candidates
        .iter()
        .find_map(|c| c.get().filter(|v| *v > 0))
        .map_or(DEFAULT_MAX_PLAYERS, |v| count(Some(v)))
}

fn server_ping(ping: LenientInt) -> u32 {
    ping.get()
        .filter(|v| *v > 0)
        .map_or(DEFAULT_SERVER_PING, |v| count(Some(v)))
}

fn map_or_default(map: Option<&str>) -> String {
    map.unwrap_or(DEFAULT_MAP).to_string()
}

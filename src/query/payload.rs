// src/query/payload.rs
//
// Typed response shapes, one per third-party source. Every field is optional
// and decoded leniently: the monitoring services disagree on whether numbers
// are numbers or strings, so numeric fields accept both and anything
// unparsable counts as missing.
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::models::server::Rule;
use crate::query::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    MyArena,
    A2s,
    GameTools,
    BattleMetrics,
    Steam,
    Generic,
}

/// Decoded body of one source response.
#[derive(Debug, Clone)]
pub enum SourcePayload {
    MyArena(MyArenaPayload),
    A2s(A2sPayload),
    GameTools(GameToolsPayload),
    BattleMetrics(BattleMetricsPayload),
    Steam(SteamPayload),
    Generic(GenericPayload),
}

impl SourcePayload {
    pub fn decode(kind: SourceKind, body: &[u8]) -> Result<Self, QueryError> {
        let payload = match kind {
            SourceKind::MyArena => Self::MyArena(serde_json::from_slice(body)?),
            SourceKind::A2s => Self::A2s(serde_json::from_slice(body)?),
            SourceKind::GameTools => Self::GameTools(serde_json::from_slice(body)?),
            SourceKind::BattleMetrics => Self::BattleMetrics(serde_json::from_slice(body)?),
            SourceKind::Steam => Self::Steam(serde_json::from_slice(body)?),
            SourceKind::Generic => Self::Generic(serde_json::from_slice(body)?),
        };
        Ok(payload)
    }
}

/// Integer that may arrive as a JSON number or a numeric string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LenientInt(Option<i64>);

impl LenientInt {
    pub fn get(self) -> Option<i64> {
        self.0
    }

    /// Zero is treated like a missing value.
    pub fn non_zero(self) -> Option<i64> {
        self.0.filter(|v| *v != 0)
    }

    pub fn is_present(self) -> bool {
        self.0.is_some()
    }
}

impl<'de> Deserialize<'de> for LenientInt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self(parse_int(&value)))
    }
}

fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => parse_leading_int(s),
        _ => None,
    }
}

// Same reading as a browser's parseInt: optional sign, then leading digits.
fn parse_leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (sign, rest) = match text.as_bytes().first() {
        Some(b'-') => (-1, &text[1..]),
        Some(b'+') => (1, &text[1..]),
        _ => (1, text),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().ok().map(|v| v * sign)
}

/// Text field that tolerates numbers; empty strings count as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LenientText(Option<String>);

impl LenientText {
    pub fn get(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn or<'a>(&'a self, other: &'a LenientText) -> Option<&'a str> {
        self.get().or_else(|| other.get())
    }
}

impl<'de> Deserialize<'de> for LenientText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = match Value::deserialize(deserializer)? {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        };
        Ok(Self(text))
    }
}

/// Array whose malformed elements decode to their defaults instead of failing
/// the whole payload. A non-array value decodes as absent.
#[derive(Debug, Clone, PartialEq)]
pub struct LenientList<T>(Option<Vec<T>>);

impl<T> Default for LenientList<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> LenientList<T> {
    pub fn get(&self) -> Option<&[T]> {
        self.0.as_deref()
    }

    pub fn first(&self) -> Option<&T> {
        self.0.as_ref().and_then(|items| items.first())
    }
}

impl<'de, T: DeserializeOwned + Default> Deserialize<'de> for LenientList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = match Value::deserialize(deserializer)? {
            Value::Array(items) => Some(lenient_items(items)),
            _ => None,
        };
        Ok(Self(items))
    }
}

fn lenient_items<T: DeserializeOwned + Default>(items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .map(|item| serde_json::from_value(item).unwrap_or_default())
        .collect()
}

/// Server cvars, sent either as `[{"key": "value"}, ...]` or as one object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleList(pub Vec<Rule>);

impl<'de> Deserialize<'de> for RuleList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut rules = Vec::new();
        match Value::deserialize(deserializer)? {
            Value::Array(items) => {
                for item in items {
                    if let Value::Object(map) = item {
                        rules.extend(map.into_iter().map(|(k, v)| Rule::new(k, rule_value(v))));
                    }
                }
            }
            Value::Object(map) => {
                rules.extend(map.into_iter().map(|(k, v)| Rule::new(k, rule_value(v))));
            }
            _ => {}
        }
        Ok(Self(rules))
    }
}

fn rule_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPlayer {
    pub name: LenientText,
    #[serde(rename = "Name")]
    pub name_upper: LenientText,
    pub nick: LenientText,
    pub score: LenientInt,
    pub frags: LenientInt,
    #[serde(rename = "Frags")]
    pub frags_upper: LenientInt,
    pub kills: LenientInt,
    pub deaths: LenientInt,
    pub time: LenientInt,
    #[serde(rename = "Time")]
    pub time_upper: LenientInt,
    pub duration: LenientInt,
    pub ping: LenientInt,
}

/// First-party monitoring dashboard.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MyArenaPayload {
    pub name: LenientText,
    pub hostname: LenientText,
    pub map: LenientText,
    pub players: LenientInt,
    pub numplayers: LenientInt,
    pub maxplayers: LenientInt,
    pub ping: LenientInt,
    pub online: Option<Value>,
    #[serde(rename = "playersList")]
    pub players_list_camel: LenientList<RawPlayer>,
    pub players_list: LenientList<RawPlayer>,
}

/// Query proxies that relay the A2S INFO/PLAYER/RULES answers as JSON.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct A2sPayload {
    pub info: Option<A2sInfo>,
    pub ping: LenientInt,
    pub players: LenientList<RawPlayer>,
    pub rules: RuleList,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct A2sInfo {
    pub name: LenientText,
    #[serde(rename = "HostName")]
    pub host_name: LenientText,
    pub hostname: LenientText,
    pub map: LenientText,
    #[serde(rename = "Map")]
    pub map_upper: LenientText,
    pub players: LenientInt,
    #[serde(rename = "Players")]
    pub players_upper: LenientInt,
    #[serde(rename = "maxPlayers")]
    pub max_players: LenientInt,
    pub maxplayers: LenientInt,
    #[serde(rename = "MaxPlayers")]
    pub max_players_upper: LenientInt,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GameToolsPayload {
    pub name: LenientText,
    pub map: LenientText,
    pub numplayers: LenientInt,
    pub maxplayers: LenientInt,
    pub ping: LenientInt,
    pub players: LenientList<RawPlayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BattleMetricsPayload {
    pub data: LenientList<BattleMetricsServer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BattleMetricsServer {
    pub attributes: Option<BattleMetricsAttributes>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BattleMetricsAttributes {
    pub name: LenientText,
    pub players: LenientInt,
    #[serde(rename = "maxPlayers")]
    pub max_players: LenientInt,
    pub status: LenientText,
    pub details: BattleMetricsDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BattleMetricsDetails {
    pub map: LenientText,
}

/// Platform server list. Carries no player list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SteamPayload {
    pub response: Option<SteamResponse>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SteamResponse {
    pub servers: LenientList<SteamServer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SteamServer {
    pub name: LenientText,
    pub map: LenientText,
    pub players: LenientInt,
    pub max_players: LenientInt,
}

/// Catch-all for lookup services; `players` is either a count or a list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenericPayload {
    pub hostname: LenientText,
    pub name: LenientText,
    pub map: LenientText,
    pub players: PlayersField,
    pub numplayers: LenientInt,
    pub maxplayers: LenientInt,
    #[serde(rename = "maxPlayers")]
    pub max_players: LenientInt,
    pub ping: LenientInt,
    #[serde(rename = "playerList")]
    pub player_list: LenientList<RawPlayer>,
}

/// An array is a player list, with malformed entries kept as defaults.
/// Anything else is read as a count.
#[derive(Debug, Clone)]
pub enum PlayersField {
    List(Vec<RawPlayer>),
    Count(LenientInt),
}

impl<'de> Deserialize<'de> for PlayersField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => Self::List(lenient_items(items)),
            other => Self::Count(LenientInt(parse_int(&other))),
        })
    }
}

impl Default for PlayersField {
    fn default() -> Self {
        PlayersField::Count(LenientInt::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_int_reads_numbers_and_numeric_strings() {
        let values: Vec<LenientInt> =
            serde_json::from_str(r#"[12, "7", " 30 players", 4.9, "x", null, true, "-3"]"#).unwrap();
        let got: Vec<Option<i64>> = values.into_iter().map(LenientInt::get).collect();
        assert_eq!(got, vec![Some(12), Some(7), Some(30), Some(4), None, None, None, Some(-3)]);
    }

    #[test]
    fn malformed_list_elements_fall_back_to_defaults() {
        let payload: GameToolsPayload =
            serde_json::from_str(r#"{"players": [{"name": "a"}, 5, "b"]}"#).unwrap();
        let players = payload.players.get().unwrap();
        assert_eq!(players.len(), 3);
        assert_eq!(players[0].name.get(), Some("a"));
        assert_eq!(players[1].name.get(), None);
    }

    #[test]
    fn rules_accept_list_of_pairs_or_object() {
        let from_list: RuleList =
            serde_json::from_str(r#"[{"mp_friendlyfire": "0"}, {"sv_gravity": 800}]"#).unwrap();
        assert_eq!(
            from_list.0,
            vec![Rule::new("mp_friendlyfire", "0"), Rule::new("sv_gravity", "800")]
        );

        let from_object: RuleList = serde_json::from_str(r#"{"mp_maxrounds": "30"}"#).unwrap();
        assert_eq!(from_object.0, vec![Rule::new("mp_maxrounds", "30")]);
    }

    #[test]
    fn generic_players_field_is_count_or_list() {
        let counted: GenericPayload = serde_json::from_str(r#"{"players": "12"}"#).unwrap();
        assert!(matches!(counted.players, PlayersField::Count(c) if c.get() == Some(12)));

        let listed: GenericPayload =
            serde_json::from_str(r#"{"players": [{"name": "x", "frags": 3}]}"#).unwrap();
        assert!(matches!(listed.players, PlayersField::List(ref l) if l.len() == 1));
    }

    #[test]
    fn bad_entry_in_generic_player_list_keeps_the_rest() {
        let payload: GenericPayload = serde_json::from_str(
            r#"{"players": [{"name": "a", "frags": 2}, 5, {"name": "b", "frags": 9}]}"#,
        )
        .unwrap();
        let PlayersField::List(players) = payload.players else {
            panic!("expected a player list");
        };
        assert_eq!(players.len(), 3);
        assert_eq!(players[0].name.get(), Some("a"));
        assert_eq!(players[1].name.get(), None);
        assert_eq!(players[2].frags.get(), Some(9));
    }

    #[test]
    fn non_object_body_is_a_decode_error() {
        let err = SourcePayload::decode(SourceKind::Steam, b"[1, 2]").unwrap_err();
        assert!(matches!(err, QueryError::Decode(_)));
    }
}

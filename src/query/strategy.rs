// src/query/strategy.rs
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::debug;
use reqwest::header::ACCEPT;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::config::Config;
use crate::models::server::QueryResult;
use crate::query::normalize::normalize;
use crate::query::payload::{SourceKind, SourcePayload};
use crate::query::QueryError;

/// One named way of obtaining the server's state.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    async fn query(&self) -> Result<QueryResult, QueryError>;
}

#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    pub kind: SourceKind,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, kind: SourceKind) -> Self {
        Self { url: url.into(), kind }
    }
}

/// Walks a list of HTTP endpoints in order; the first that answers with a
/// decodable body wins.
pub struct HttpStrategy {
    name: String,
    endpoints: Vec<Endpoint>,
    client: reqwest::Client,
    server_name: String,
}

impl HttpStrategy {
    pub fn new(
        name: impl Into<String>,
        endpoints: Vec<Endpoint>,
        client: reqwest::Client,
        server_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoints,
            client,
            server_name: server_name.into(),
        }
    }

    async fn fetch(&self, endpoint: &Endpoint) -> Result<QueryResult, QueryError> {
        let response = self
            .client
            .get(&endpoint.url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        let payload = SourcePayload::decode(endpoint.kind, &body)?;
        let normalized = normalize(&payload, &self.server_name, &mut rand::thread_rng())?;

        Ok(QueryResult::success(
            self.name.clone(),
            normalized.server_info,
            normalized.players,
            normalized.rules,
        ))
    }
}

#[async_trait]
impl Strategy for HttpStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self) -> Result<QueryResult, QueryError> {
        let mut last_error = QueryError::Shape(format!("{} has no endpoints", self.name));

        for endpoint in &self.endpoints {
            match self.fetch(endpoint).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    debug!("{}: endpoint {} failed: {}", self.name, endpoint.url, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

/// Asks a WebSocket relay to run the query and reads the first frame back.
pub struct WebSocketStrategy {
    name: String,
    url: String,
    server_address: String,
    timeout_secs: u64,
    server_name: String,
}

impl WebSocketStrategy {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        server_address: impl Into<String>,
        timeout_secs: u64,
        server_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            server_address: server_address.into(),
            timeout_secs,
            server_name: server_name.into(),
        }
    }
}

fn ws_error(e: impl std::fmt::Display) -> QueryError {
    QueryError::WebSocket(e.to_string())
}

#[async_trait]
impl Strategy for WebSocketStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self) -> Result<QueryResult, QueryError> {
        let (mut ws, _response) = connect_async(self.url.as_str()).await.map_err(ws_error)?;
        debug!("{}: connected to {}", self.name, self.url);

        let request = serde_json::json!({
            "command": "query",
            "server": self.server_address,
            "timeout": self.timeout_secs,
        });
        ws.send(WsMessage::Text(request.to_string().into()))
            .await
            .map_err(ws_error)?;

        while let Some(message) = ws.next().await {
            let body: Vec<u8> = match message.map_err(ws_error)? {
                WsMessage::Text(text) => text.as_bytes().to_vec(),
                WsMessage::Binary(bin) => bin.to_vec(),
                WsMessage::Close(frame) => {
                    return Err(QueryError::WebSocket(format!("closed by relay: {:?}", frame)));
                }
                _ => continue,
            };
            let _ = ws.close(None).await;

            let payload = SourcePayload::decode(SourceKind::A2s, &body)?;
            let normalized = normalize(&payload, &self.server_name, &mut rand::thread_rng())?;
            return Ok(QueryResult::success(
                self.name.clone(),
                normalized.server_info,
                normalized.players,
                normalized.rules,
            ));
        }

        Err(QueryError::WebSocket("connection ended without a response".to_string()))
    }
}

/// The fixed source list, in the order it is tried.
pub fn default_strategies(config: &Config, client: reqwest::Client) -> Vec<Arc<dyn Strategy>> {
    let addr = config.game_server_address();
    let ip = &config.game_server_ip;
    let port = config.game_server_port;
    let id = config.myarena_game_id;
    let name = config.server_display_name.as_str();

    let http = |label: &str, endpoints: Vec<Endpoint>| -> Arc<dyn Strategy> {
        Arc::new(HttpStrategy::new(label, endpoints, client.clone(), name))
    };

    vec![
        http(
            "MyArena API",
            vec![
                Endpoint::new(format!("https://www.myarena.ru/api/game-monitoring/{}", id), SourceKind::MyArena),
                Endpoint::new(format!("https://myarena.ru/api/game-monitoring/{}", id), SourceKind::MyArena),
                Endpoint::new(format!("https://api.myarena.ru/server/{}", id), SourceKind::MyArena),
                Endpoint::new(format!("https://www.myarena.ru/monitoring/{}.json", id), SourceKind::MyArena),
            ],
        ),
        http(
            "A2S Query Proxy",
            vec![
                Endpoint::new(format!("https://api.sourcequery.net/query/{}", addr), SourceKind::A2s),
                Endpoint::new(format!("https://sourcequery.herokuapp.com/query/{}", addr), SourceKind::A2s),
                Endpoint::new(
                    format!("https://cs-query-proxy.vercel.app/api/query?ip={}&port={}", ip, port),
                    SourceKind::A2s,
                ),
            ],
        ),
        http(
            "GameServer API",
            vec![
                Endpoint::new(format!("https://api.gametools.network/css/{}", addr), SourceKind::GameTools),
                Endpoint::new(
                    format!("https://api.battlemetrics.com/servers?filter[search]={}", addr),
                    SourceKind::BattleMetrics,
                ),
                Endpoint::new(format!("https://api.gameserverquery.com/v1/css/{}", addr), SourceKind::Generic),
                Endpoint::new(format!("https://cssquery.ru/api/server/{}", addr), SourceKind::Generic),
            ],
        ),
        http(
            "Steam Web API",
            vec![Endpoint::new(
                format!("https://api.steampowered.com/ISteamApps/GetServersAtAddress/v0001/?addr={}&format=json", ip),
                SourceKind::Steam,
            )],
        ),
        Arc::new(WebSocketStrategy::new(
            "Source Query WebSocket",
            format!("wss://sourcequery-proxy.herokuapp.com/query/{}", addr),
            addr.clone(),
            config.attempt_timeout().as_secs().max(1),
            name,
        )),
        http(
            "SourceQuery.net",
            vec![Endpoint::new(format!("https://api.sourcequery.net/info/{}", addr), SourceKind::A2s)],
        ),
        http(
            "ServerQuery.net",
            vec![Endpoint::new(format!("https://serverquery.net/api/css/{}", addr), SourceKind::Generic)],
        ),
        http(
            "CS Monitor",
            vec![Endpoint::new(format!("https://cs-monitor.ru/api/server/{}", addr), SourceKind::Generic)],
        ),
    ]
}

//! Server status aggregation: typed source payloads, normalizers, retrieval
//! strategies, the aggregator that walks them and the polling loop that owns
//! the displayed state.

pub mod aggregator;
pub mod fallback;
pub mod normalize;
pub mod payload;
pub mod ping;
pub mod poller;
pub mod strategy;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected HTTP status {0}")]
    Status(u16),
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Unexpected response shape: {0}")]
    Shape(String),
    #[error("WebSocket error: {0}")]
    WebSocket(String),
    #[error("Timed out after {0} ms")]
    Timeout(u64),
    #[error("Query cancelled")]
    Cancelled,
    #[error("All sources failed: {0}")]
    Exhausted(String),
}

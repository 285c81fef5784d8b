// src/utils.rs
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::RateLimiter;
use log::{debug, error};
use serde_json::json;
use std::fmt;
use std::net::IpAddr;

use crate::chat::ChatError;
use crate::forum::ForumError;

pub type IpRateLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

// Distinct types so both limiters can live in app data side by side.
pub struct RefreshLimiter(pub IpRateLimiter);
pub struct ForumWriteLimiter(pub IpRateLimiter);

#[derive(Debug)]
pub enum RequestError {
    MissingPeerIP,
    RateLimitExceeded,
    Validation(String),
    NotFound(String),
    Internal(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPeerIP => write!(f, "Failed to extract client IP"),
            Self::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            Self::Validation(msg) => write!(f, "{}", msg),
            Self::NotFound(what) => write!(f, "Not found: {}", what),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl ResponseError for RequestError {
    fn error_response(&self) -> HttpResponse {
        let body = json!({ "error": self.to_string() });
        match self {
            Self::RateLimitExceeded => HttpResponse::TooManyRequests().json(body),
            Self::NotFound(_) => HttpResponse::NotFound().json(body),
            Self::Internal(_) => HttpResponse::InternalServerError().json(body),
            Self::MissingPeerIP | Self::Validation(_) => HttpResponse::BadRequest().json(body),
        }
    }
}

impl From<ForumError> for RequestError {
    fn from(e: ForumError) -> Self {
        match e {
            ForumError::Validation(msg) => Self::Validation(msg),
            ForumError::NotFound(what) => Self::NotFound(what),
            ForumError::Store(e) => {
                error!("Forum storage failure: {}", e);
                Self::Internal(e.to_string())
            }
        }
    }
}

impl From<ChatError> for RequestError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Validation(msg) => Self::Validation(msg),
            ChatError::Store(e) => {
                error!("Chat storage failure: {}", e);
                Self::Internal(e.to_string())
            }
        }
    }
}

/// Client address: first `X-Forwarded-For` entry, then `X-Real-IP`, then the
/// connection's peer address.
pub fn extract_client_ip(req: &HttpRequest) -> Result<IpAddr, RequestError> {
    let header_ip = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok())
    };

    if let Some(ip) = header_ip("X-Forwarded-For") {
        return Ok(ip);
    }
    if let Some(ip) = header_ip("X-Real-IP") {
        debug!("Using provided X-Real-IP: {}", ip);
        return Ok(ip);
    }

    req.peer_addr()
        .map(|addr| addr.ip())
        .ok_or(RequestError::MissingPeerIP)
}

/// Resolves the client and charges one cell of `limiter` to it.
pub fn check_rate_limit(req: &HttpRequest, limiter: &IpRateLimiter, what: &str) -> Result<IpAddr, RequestError> {
    let ip = extract_client_ip(req)?;
    if limiter.check_key(&ip).is_err() {
        error!("Rate limit exceeded for {} for ip: {}", what, ip);
        return Err(RequestError::RateLimitExceeded);
    }
    Ok(ip)
}

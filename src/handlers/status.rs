// src/handlers/status.rs
use actix_web::{web, HttpRequest, HttpResponse};
use log::debug;
use serde_json::json;

use crate::config::Config;
use crate::players::top_players;
use crate::query::ping::measure_ping;
use crate::query::poller::StatusPoller;
use crate::utils::{check_rate_limit, RefreshLimiter, RequestError};

pub async fn get_status(poller: web::Data<StatusPoller>) -> HttpResponse {
    HttpResponse::Ok().json(poller.snapshot())
}

pub async fn get_details(poller: web::Data<StatusPoller>) -> Result<HttpResponse, RequestError> {
    let details = poller
        .snapshot()
        .details()
        .ok_or_else(|| RequestError::NotFound("server status has not been fetched yet".to_string()))?;
    Ok(HttpResponse::Ok().json(details))
}

pub async fn refresh_status(
    req: HttpRequest,
    poller: web::Data<StatusPoller>,
    limiter: web::Data<RefreshLimiter>,
) -> Result<HttpResponse, RequestError> {
    let ip = check_rate_limit(&req, &limiter.0, "status refresh")?;
    debug!("Manual status refresh requested by {}", ip);

    let snapshot = poller.refresh().await;
    Ok(HttpResponse::Ok().json(snapshot))
}

pub async fn get_ping(config: web::Data<Config>) -> HttpResponse {
    let ping = measure_ping(&config.game_server_address(), config.ping_timeout()).await;
    HttpResponse::Ok().json(json!({ "ping": ping }))
}

pub async fn get_top_players(poller: web::Data<StatusPoller>) -> HttpResponse {
    let online = poller
        .snapshot()
        .result
        .map(|result| result.players)
        .unwrap_or_default();
    let board = top_players(&online, &mut rand::thread_rng());
    HttpResponse::Ok().json(board)
}

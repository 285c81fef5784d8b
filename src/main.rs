// src/main.rs
mod chat;
mod config;
mod forum;
mod handlers;
mod models;
mod players;
mod query;
mod storage;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use env_logger::Env;
use governor::RateLimiter;
use log::info;

use crate::chat::ChatStore;
use crate::config::Config;
use crate::forum::ForumStore;
use crate::query::aggregator::Aggregator;
use crate::query::poller::StatusPoller;
use crate::storage::memory::MemoryStore;
use crate::utils::{ForumWriteLimiter, RefreshLimiter};

const USER_AGENT: &str = concat!("css-status/", env!("CARGO_PKG_VERSION"));

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env();
    let bind = config.bind();

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.attempt_timeout() + Duration::from_secs(1))
        .build()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("Failed to build HTTP client: {}", e)))?;

    let aggregator = Aggregator::from_config(&config, client);
    info!(
        "Watching {} ({}) in {:?} mode, {:?} fallback",
        config.server_display_name,
        config.game_server_address(),
        aggregator.race_mode(),
        config.fallback_mode
    );
    let poller = StatusPoller::new(aggregator, config.poll_interval());
    let polling = poller.spawn();

    let store = Arc::new(MemoryStore::new());
    let forum = web::Data::new(ForumStore::new(store.clone()));
    let chat = web::Data::new(ChatStore::new(store));
    let refresh_limiter = web::Data::new(RefreshLimiter(RateLimiter::keyed(config.refresh_quota())));
    let forum_write_limiter = web::Data::new(ForumWriteLimiter(RateLimiter::keyed(config.forum_write_quota())));
    let status = web::Data::new(poller.clone());
    let settings = web::Data::new(config);

    info!("Starting server on {}", bind);
    let served = HttpServer::new(move || {
        App::new()
            .app_data(status.clone())
            .app_data(settings.clone())
            .app_data(forum.clone())
            .app_data(chat.clone())
            .app_data(refresh_limiter.clone())
            .app_data(forum_write_limiter.clone())
            .route("/api/health", web::get().to(handlers::index::health))
            .route("/api/status", web::get().to(handlers::status::get_status))
            .route("/api/status/details", web::get().to(handlers::status::get_details))
            .route("/api/status/refresh", web::post().to(handlers::status::refresh_status))
            .route("/api/status/ping", web::get().to(handlers::status::get_ping))
            .route("/api/players/top", web::get().to(handlers::status::get_top_players))
            .service(
                web::scope("/api/forum")
                    .route("/sections", web::get().to(handlers::forum::get_sections))
                    .route("/topics", web::get().to(handlers::forum::get_topics))
                    .route("/topics", web::post().to(handlers::forum::create_topic))
                    .route("/topics", web::delete().to(handlers::forum::clear_forum))
                    .route("/topics/{id}/replies", web::get().to(handlers::forum::get_replies))
                    .route("/topics/{id}/replies", web::post().to(handlers::forum::create_reply))
                    .route("/replies/{id}/like", web::post().to(handlers::forum::like_reply))
                    .route("/session", web::get().to(handlers::forum::get_session))
                    .route("/session", web::post().to(handlers::forum::sign_in))
                    .route("/session", web::delete().to(handlers::forum::sign_out)),
            )
            .service(
                web::scope("/api/chat")
                    .route("/messages", web::get().to(handlers::chat::get_messages))
                    .route("/messages", web::post().to(handlers::chat::post_message))
                    .route("/users", web::get().to(handlers::chat::get_users)),
            )
    })
    .bind(&bind)?
    .run()
    .await;

    poller.shutdown();
    if let Err(e) = polling.await {
        log::error!("Status poller ended abnormally: {}", e);
    }
    info!("Server stopped");

    served
}

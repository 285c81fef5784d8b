// src/handlers/chat.rs
use actix_web::{web, HttpRequest, HttpResponse};
use log::debug;
use serde::Deserialize;

use crate::chat::ChatStore;
use crate::utils::{check_rate_limit, ForumWriteLimiter, RequestError};

#[derive(Deserialize)]
pub struct NewMessageRequest {
    message: String,
    username: Option<String>,
}

pub async fn get_messages(chat: web::Data<ChatStore>) -> Result<HttpResponse, RequestError> {
    Ok(HttpResponse::Ok().json(chat.messages()?))
}

pub async fn post_message(
    req: HttpRequest,
    chat: web::Data<ChatStore>,
    limiter: web::Data<ForumWriteLimiter>,
    body: web::Json<NewMessageRequest>,
) -> Result<HttpResponse, RequestError> {
    let ip = check_rate_limit(&req, &limiter.0, "chat message")?;

    let message = chat.send(body.username.as_deref(), &body.message)?;
    debug!("{} posted to chat from {}", message.username, ip);

    Ok(HttpResponse::Created().json(message))
}

pub async fn get_users(chat: web::Data<ChatStore>) -> HttpResponse {
    HttpResponse::Ok().json(chat.online_users())
}

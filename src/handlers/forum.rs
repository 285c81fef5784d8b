// src/handlers/forum.rs
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;

use crate::forum::ForumStore;
use crate::models::forum::{TopicDraft, User};
use crate::utils::{check_rate_limit, ForumWriteLimiter, RequestError};

#[derive(Deserialize)]
pub struct NewTopicRequest {
    #[serde(flatten)]
    draft: TopicDraft,
    user: Option<User>,
}

#[derive(Deserialize)]
pub struct NewReplyRequest {
    content: String,
    user: Option<User>,
}

#[derive(Deserialize, Default)]
pub struct LikeRequest {
    email: Option<String>,
}

// Falls back to the signed-in user when the body names nobody. The session
// is one server-wide `currentUser`, so an anonymous write from any client is
// attributed to whoever signed in last.
fn author(forum: &ForumStore, supplied: Option<User>) -> Result<User, RequestError> {
    match supplied {
        Some(user) => Ok(user),
        None => forum
            .current_user()?
            .ok_or_else(|| RequestError::Validation("Sign in to post on the forum".to_string())),
    }
}

pub async fn get_sections(forum: web::Data<ForumStore>) -> HttpResponse {
    HttpResponse::Ok().json(forum.sections())
}

pub async fn get_topics(forum: web::Data<ForumStore>) -> Result<HttpResponse, RequestError> {
    Ok(HttpResponse::Ok().json(forum.topics()?))
}

pub async fn create_topic(
    req: HttpRequest,
    forum: web::Data<ForumStore>,
    limiter: web::Data<ForumWriteLimiter>,
    body: web::Json<NewTopicRequest>,
) -> Result<HttpResponse, RequestError> {
    check_rate_limit(&req, &limiter.0, "topic creation")?;

    let NewTopicRequest { draft, user } = body.into_inner();
    let user = author(&forum, user)?;
    let topic = forum.create_topic(&draft, &user)?;
    info!("New topic \"{}\" by {}", topic.title, topic.author);

    Ok(HttpResponse::Created().json(topic))
}

pub async fn clear_forum(
    req: HttpRequest,
    forum: web::Data<ForumStore>,
    limiter: web::Data<ForumWriteLimiter>,
) -> Result<HttpResponse, RequestError> {
    let ip = check_rate_limit(&req, &limiter.0, "forum clear")?;

    forum.clear();
    info!("Forum topics and replies cleared by {}", ip);
    Ok(HttpResponse::NoContent().finish())
}

pub async fn get_replies(
    forum: web::Data<ForumStore>,
    topic_id: web::Path<String>,
) -> Result<HttpResponse, RequestError> {
    Ok(HttpResponse::Ok().json(forum.replies_for_topic(&topic_id)?))
}

pub async fn create_reply(
    req: HttpRequest,
    forum: web::Data<ForumStore>,
    limiter: web::Data<ForumWriteLimiter>,
    topic_id: web::Path<String>,
    body: web::Json<NewReplyRequest>,
) -> Result<HttpResponse, RequestError> {
    check_rate_limit(&req, &limiter.0, "reply")?;

    let NewReplyRequest { content, user } = body.into_inner();
    let user = author(&forum, user)?;
    let reply = forum.add_reply(&topic_id, &content, &user)?;
    debug!("Reply {} added to topic {}", reply.id, topic_id);

    Ok(HttpResponse::Created().json(reply))
}

pub async fn like_reply(
    req: HttpRequest,
    forum: web::Data<ForumStore>,
    limiter: web::Data<ForumWriteLimiter>,
    reply_id: web::Path<String>,
    body: Option<web::Json<LikeRequest>>,
) -> Result<HttpResponse, RequestError> {
    check_rate_limit(&req, &limiter.0, "like")?;

    let supplied = body.map(|b| b.into_inner()).unwrap_or_default().email;
    let email = match supplied {
        Some(email) if !email.trim().is_empty() => email,
        _ => author(&forum, None)?.email,
    };

    let liked = forum.toggle_like(&reply_id, &email)?;
    Ok(HttpResponse::Ok().json(json!({ "liked": liked })))
}

pub async fn get_session(forum: web::Data<ForumStore>) -> Result<HttpResponse, RequestError> {
    Ok(HttpResponse::Ok().json(forum.current_user()?))
}

pub async fn sign_in(
    req: HttpRequest,
    forum: web::Data<ForumStore>,
    limiter: web::Data<ForumWriteLimiter>,
    user: web::Json<User>,
) -> Result<HttpResponse, RequestError> {
    check_rate_limit(&req, &limiter.0, "sign in")?;

    forum.sign_in(&user)?;
    info!("{} signed in", user.nickname);
    Ok(HttpResponse::Ok().json(user.into_inner()))
}

pub async fn sign_out(
    req: HttpRequest,
    forum: web::Data<ForumStore>,
    limiter: web::Data<ForumWriteLimiter>,
) -> Result<HttpResponse, RequestError> {
    check_rate_limit(&req, &limiter.0, "sign out")?;

    forum.sign_out();
    Ok(HttpResponse::NoContent().finish())
}

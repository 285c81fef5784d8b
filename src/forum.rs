// src/forum.rs
use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use log::debug;
use parking_lot::Mutex;

use crate::models::forum::{
    ForumReply, ForumSection, ForumTopic, LastReply, SectionLastPost, TopicDraft, User,
};
use crate::storage::{load_json, save_json, KeyValueStore, StoreError};

pub const TOPICS_KEY: &str = "forumTopics";
pub const REPLIES_KEY: &str = "forumReplies";
pub const CURRENT_USER_KEY: &str = "currentUser";

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_TOPIC_CHARS: usize = 2000;
pub const MAX_REPLY_CHARS: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum ForumError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn like_key(reply_id: &str, email: &str) -> String {
    format!("like_{}_{}", reply_id, email)
}

lazy_static! {
    static ref SECTIONS: Vec<ForumSection> = vec![
        section(
            "ОБЩИЕ ВОПРОСЫ",
            "Обсуждение игры, новости, анонсы",
            (156, 2341),
            ("Новое обновление сервера", "Admin_Vitalik", "2 часа назад"),
            "MessageSquare",
        ),
        section(
            "ТЕХНИЧЕСКИЕ ПРОБЛЕМЫ",
            "Баги, лаги, проблемы с подключением",
            (89, 1205),
            ("Не могу зайти на сервер", "Player_228", "15 минут назад"),
            "Settings",
        ),
        section(
            "ТАКТИКА И СТРАТЕГИЯ",
            "Обсуждение тактик, карт, оружия",
            (234, 3567),
            ("Лучшие позиции на de_dust2", "ProGamer2000", "1 час назад"),
            "Target",
        ),
        section(
            "КЛАНЫ И КОМАНДЫ",
            "Поиск команды, клановые войны",
            (67, 892),
            ("[RECRUITMENT] Ищем игроков", "ClanLeader", "3 часа назад"),
            "Users",
        ),
    ];
}

fn section(
    title: &str,
    description: &str,
    (topics, posts): (u32, u32),
    (post_title, author, time): (&str, &str, &str),
    icon: &str,
) -> ForumSection {
    ForumSection {
        title: title.to_string(),
        description: description.to_string(),
        topics,
        posts,
        last_post: SectionLastPost {
            title: post_title.to_string(),
            author: author.to_string(),
            time: time.to_string(),
        },
        icon: icon.to_string(),
    }
}

/// Topics, replies, likes and the signed-in user, kept as JSON documents in a
/// key-value store under fixed keys.
pub struct ForumStore {
    store: Arc<dyn KeyValueStore>,
    // serializes read-modify-write sequences
    write_lock: Mutex<()>,
}

impl ForumStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn sections(&self) -> &'static [ForumSection] {
        &SECTIONS
    }

    pub fn current_user(&self) -> Result<Option<User>, ForumError> {
        Ok(load_json(self.store.as_ref(), CURRENT_USER_KEY)?)
    }

    pub fn sign_in(&self, user: &User) -> Result<(), ForumError> {
        validate_user(user)?;
        save_json(self.store.as_ref(), CURRENT_USER_KEY, user)?;
        Ok(())
    }

    pub fn sign_out(&self) {
        self.store.remove(CURRENT_USER_KEY);
    }

    pub fn topics(&self) -> Result<Vec<ForumTopic>, ForumError> {
        Ok(load_json(self.store.as_ref(), TOPICS_KEY)?.unwrap_or_default())
    }

    pub fn replies(&self) -> Result<Vec<ForumReply>, ForumError> {
        Ok(load_json(self.store.as_ref(), REPLIES_KEY)?.unwrap_or_default())
    }

    pub fn replies_for_topic(&self, topic_id: &str) -> Result<Vec<ForumReply>, ForumError> {
        Ok(self
            .replies()?
            .into_iter()
            .filter(|reply| reply.topic_id == topic_id)
            .collect())
    }

    pub fn create_topic(&self, draft: &TopicDraft, user: &User) -> Result<ForumTopic, ForumError> {
        validate_user(user)?;
        let title = draft.title.trim();
        let content = draft.content.trim();
        if title.is_empty() || content.is_empty() || draft.category.trim().is_empty() {
            return Err(ForumError::Validation(
                "title, category and content are required".to_string(),
            ));
        }
        check_length("title", title, MAX_TITLE_CHARS)?;
        check_length("content", content, MAX_TOPIC_CHARS)?;

        let topic = ForumTopic {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            category: draft.category.trim().to_string(),
            content: content.to_string(),
            author: user.nickname.clone(),
            author_email: user.email.clone(),
            created_at: Utc::now().to_rfc3339(),
            tags: draft
                .tags
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect(),
            views: 0,
            replies: 0,
            last_reply: None,
        };

        let _guard = self.write_lock.lock();
        let mut topics = self.topics()?;
        topics.insert(0, topic.clone());
        save_json(self.store.as_ref(), TOPICS_KEY, &topics)?;
        debug!("Topic {} created by {}", topic.id, topic.author);

        Ok(topic)
    }

    pub fn add_reply(&self, topic_id: &str, content: &str, user: &User) -> Result<ForumReply, ForumError> {
        validate_user(user)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(ForumError::Validation("reply content is required".to_string()));
        }
        check_length("reply", content, MAX_REPLY_CHARS)?;

        let _guard = self.write_lock.lock();
        let mut topics = self.topics()?;
        let topic = topics
            .iter_mut()
            .find(|topic| topic.id == topic_id)
            .ok_or_else(|| ForumError::NotFound(format!("topic {}", topic_id)))?;
        topic.replies += 1;
        topic.last_reply = Some(LastReply {
            author: user.nickname.clone(),
            time: "just now".to_string(),
        });

        let reply = ForumReply {
            id: uuid::Uuid::new_v4().to_string(),
            topic_id: topic_id.to_string(),
            content: content.to_string(),
            author: user.nickname.clone(),
            author_email: user.email.clone(),
            created_at: Utc::now().to_rfc3339(),
            likes: 0,
        };
        let mut replies = self.replies()?;
        replies.insert(0, reply.clone());

        save_json(self.store.as_ref(), REPLIES_KEY, &replies)?;
        save_json(self.store.as_ref(), TOPICS_KEY, &topics)?;

        Ok(reply)
    }

    /// Adds one like per (reply, user). Returns false when this user already
    /// liked the reply.
    pub fn toggle_like(&self, reply_id: &str, email: &str) -> Result<bool, ForumError> {
        let key = like_key(reply_id, email);

        let _guard = self.write_lock.lock();
        if self.store.get(&key).is_some() {
            return Ok(false);
        }

        let mut replies = self.replies()?;
        let reply = replies
            .iter_mut()
            .find(|reply| reply.id == reply_id)
            .ok_or_else(|| ForumError::NotFound(format!("reply {}", reply_id)))?;
        reply.likes += 1;

        save_json(self.store.as_ref(), REPLIES_KEY, &replies)?;
        self.store.set(&key, "true".to_string());
        Ok(true)
    }

    pub fn clear(&self) {
        let _guard = self.write_lock.lock();
        self.store.remove(TOPICS_KEY);
        self.store.remove(REPLIES_KEY);
    }
}

fn validate_user(user: &User) -> Result<(), ForumError> {
    if user.nickname.trim().is_empty() || user.email.trim().is_empty() {
        return Err(ForumError::Validation("nickname and email are required".to_string()));
    }
    Ok(())
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), ForumError> {
    if value.chars().count() > max {
        return Err(ForumError::Validation(format!(
            "{} is longer than {} characters",
            field, max
        )));
    }
    Ok(())
}

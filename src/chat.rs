// src/chat.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use log::debug;
use parking_lot::Mutex;

use crate::models::chat::{ChatMessage, MessageKind, OnlineUser};
use crate::storage::{load_json, save_json, KeyValueStore, StoreError};

pub const MESSAGES_KEY: &str = "chatMessages";
pub const MAX_MESSAGE_CHARS: usize = 500;
pub const GUEST_NAME: &str = "Гость";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

lazy_static! {
    static ref ONLINE_USERS: Vec<OnlineUser> = [
        ("PlayerOne", "В игре"),
        ("FragMaster", "В лобби"),
        ("SnipeKing", "Онлайн"),
        ("CyberNinja", "В игре"),
        ("Headshot", "Онлайн"),
    ]
    .into_iter()
    .map(|(name, status)| OnlineUser {
        name: name.to_string(),
        status: status.to_string(),
    })
    .collect();
}

// Conversation shown before anyone has written, timed relative to `now`.
fn seed_messages(now: DateTime<Utc>) -> Vec<ChatMessage> {
    [
        ("Admin", "Добро пожаловать в чат Counter-Strike: Source!", 300, MessageKind::Admin),
        ("PlayerOne", "Кто хочет поиграть на de_dust2?", 240, MessageKind::User),
        ("FragMaster", "Я готов! Собираем команду", 180, MessageKind::User),
        ("System", "Сервер de_dust2 #1 доступен для подключения", 120, MessageKind::System),
        ("SnipeKing", "Ищу напарника для миссий. AWP + AK47", 60, MessageKind::User),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (username, message, ago, kind))| ChatMessage {
        id: (i + 1).to_string(),
        username: username.to_string(),
        message: message.to_string(),
        timestamp: now - Duration::seconds(ago),
        kind,
    })
    .collect()
}

/// General chat, oldest message first, stored under [`MESSAGES_KEY`].
pub struct ChatStore {
    store: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl ChatStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn messages(&self) -> Result<Vec<ChatMessage>, ChatError> {
        let stored: Option<Vec<ChatMessage>> = load_json(self.store.as_ref(), MESSAGES_KEY)?;
        Ok(stored.unwrap_or_else(|| seed_messages(Utc::now())))
    }

    pub fn online_users(&self) -> &'static [OnlineUser] {
        &ONLINE_USERS
    }

    /// Appends a user message. Blank text is rejected; a blank name posts as
    /// [`GUEST_NAME`].
    pub fn send(&self, username: Option<&str>, text: &str) -> Result<ChatMessage, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::Validation("message is empty".to_string()));
        }
        if text.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ChatError::Validation(format!(
                "message is longer than {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        let message = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            username: username
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .unwrap_or(GUEST_NAME)
                .to_string(),
            message: text.to_string(),
            timestamp: Utc::now(),
            kind: MessageKind::User,
        };

        let _guard = self.write_lock.lock();
        let mut messages = self.messages()?;
        messages.push(message.clone());
        save_json(self.store.as_ref(), MESSAGES_KEY, &messages)?;
        debug!("Chat message {} from {}", message.id, message.username);

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;

    fn chat() -> (ChatStore, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (ChatStore::new(store.clone()), store)
    }

    #[test]
    fn starts_with_seeded_conversation() {
        let (chat, store) = chat();
        let messages = chat.messages().unwrap();

        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].kind, MessageKind::Admin);
        assert_eq!(messages[3].kind, MessageKind::System);
        assert!(messages.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(store.get(MESSAGES_KEY), None);
    }

    #[test]
    fn send_appends_after_seed() {
        let (chat, _) = chat();
        let sent = chat.send(Some("Vitalik"), "  gg wp  ").unwrap();

        assert_eq!(sent.message, "gg wp");
        assert_eq!(sent.kind, MessageKind::User);

        let messages = chat.messages().unwrap();
        assert_eq!(messages.len(), 6);
        assert_eq!(messages.last().unwrap().id, sent.id);
    }

    #[test]
    fn blank_name_posts_as_guest() {
        let (chat, _) = chat();
        assert_eq!(chat.send(None, "hi").unwrap().username, GUEST_NAME);
        assert_eq!(chat.send(Some("   "), "hi").unwrap().username, GUEST_NAME);
    }

    #[test]
    fn blank_or_long_messages_are_rejected() {
        let (chat, store) = chat();
        assert!(matches!(chat.send(None, "   "), Err(ChatError::Validation(_))));
        let long = "a".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(chat.send(None, &long), Err(ChatError::Validation(_))));
        assert_eq!(store.get(MESSAGES_KEY), None);
    }

    #[test]
    fn five_users_online() {
        let (chat, _) = chat();
        assert_eq!(chat.online_users().len(), 5);
        assert_eq!(chat.online_users()[1].status, "В лобби");
    }
}

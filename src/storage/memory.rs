// src/storage/memory.rs
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::storage::{KeyValueStore, StoreEvent};

const EVENT_CAPACITY: usize = 64;

/// Process-local store backed by a concurrent map.
pub struct MemoryStore {
    entries: DashMap<String, String>,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: DashMap::new(),
            events,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn notify(&self, key: &str, value: Option<String>) {
        // No subscribers is not an error.
        let _ = self.events.send(StoreEvent {
            key: key.to_string(),
            value,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|r| r.value().clone())
    }

    fn set(&self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value.clone());
        self.notify(key, Some(value));
    }

    fn remove(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.notify(key, None);
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("forumTopics"), None);

        store.set("forumTopics", "[]".to_string());
        assert_eq!(store.get("forumTopics").as_deref(), Some("[]"));
        assert_eq!(store.len(), 1);

        store.remove("forumTopics");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_changes_in_order() {
        let store = MemoryStore::new();
        let mut events = store.subscribe();

        store.set("currentUser", "{}".to_string());
        store.remove("currentUser");
        store.remove("currentUser");

        let first = events.recv().await.unwrap();
        assert_eq!(first, StoreEvent { key: "currentUser".to_string(), value: Some("{}".to_string()) });
        let second = events.recv().await.unwrap();
        assert_eq!(second.value, None);
        assert!(events.try_recv().is_err());
    }
}

// src/models/forum.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub nickname: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastReply {
    pub author: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumTopic {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: String,
    pub content: String,
    pub author: String,
    pub author_email: String,
    pub created_at: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub views: u32,
    #[serde(default)]
    pub replies: u32,
    #[serde(default)]
    pub last_reply: Option<LastReply>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumReply {
    pub id: String,
    pub topic_id: String,
    pub content: String,
    pub author: String,
    pub author_email: String,
    pub created_at: String,
    #[serde(default)]
    pub likes: u32,
}

/// Form input for a new topic. Tags arrive as one comma-separated string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicDraft {
    pub title: String,
    pub category: String,
    pub content: String,
    #[serde(default)]
    pub tags: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionLastPost {
    pub title: String,
    pub author: String,
    pub time: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumSection {
    pub title: String,
    pub description: String,
    pub topics: u32,
    pub posts: u32,
    pub last_post: SectionLastPost,
    pub icon: String,
}

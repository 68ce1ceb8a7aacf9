//! Records and trait at the boundary between the pipeline and a forum backend.

use crate::error::CoreError;
use crate::types::TimeFilter;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A post as returned by a forum search, before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    pub id: String,
    pub title: String,
    pub body: String,
    pub score: i64,
    /// Seconds since the Unix epoch.
    pub created_utc: f64,
    /// Absolute URL of the discussion thread.
    pub permalink: String,
    pub forum: String,
}

/// A comment together with its nested replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawComment {
    pub body: String,
    pub score: i64,
    pub created_utc: f64,
    #[serde(default)]
    pub replies: Vec<RawComment>,
}

impl RawComment {
    pub fn new(body: impl Into<String>, score: i64, created_utc: f64) -> Self {
        Self {
            body: body.into(),
            score,
            created_utc,
            replies: Vec::new(),
        }
    }

    pub fn with_replies(mut self, replies: Vec<RawComment>) -> Self {
        self.replies = replies;
        self
    }
}

/// A post reloaded with its comment forest.
#[derive(Debug, Clone, PartialEq)]
pub struct RawThread {
    pub post: RawPost,
    pub comments: Vec<RawComment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub forums: Vec<String>,
    pub time_filter: TimeFilter,
    pub limit: usize,
}

/// A post with its flattened, capped comment list, ready for scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedPost {
    pub post: RawPost,
    pub comments: Vec<RawComment>,
}

#[async_trait]
pub trait PostSource: Send + Sync {
    /// Searches the given forums, returning at most `request.limit` posts in relevance order.
    async fn search_posts(&self, request: &SearchRequest) -> Result<Vec<RawPost>, CoreError>;

    /// Loads a post's thread. Implementations return an empty or partial forest
    /// when only the comment listing is unavailable.
    async fn fetch_thread(
        &self,
        post: &RawPost,
        comment_limit: usize,
    ) -> Result<RawThread, CoreError>;
}

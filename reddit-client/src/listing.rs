//! Reddit listing payloads and their conversion into source records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stocksense_core::{CoreError, RawComment, RawPost, RawThread, RedditApiError};
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub subreddit: String,
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditCommentData {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub score: i64,
    pub created_utc: f64,
    /// Either an empty string or a nested listing.
    #[serde(default)]
    pub replies: Value,
}

impl RedditPostData {
    pub fn into_raw_post(self, web_base: &Url) -> RawPost {
        let permalink = web_base
            .join(&self.permalink)
            .map(String::from)
            .unwrap_or_else(|_| format!("{}{}", web_base.as_str().trim_end_matches('/'), self.permalink));

        RawPost {
            id: self.id,
            title: self.title,
            body: self.selftext,
            score: self.score,
            created_utc: self.created_utc,
            permalink,
            forum: self.subreddit,
        }
    }
}

/// One page of search results with malformed children already dropped.
#[derive(Debug)]
pub struct SearchPage {
    pub posts: Vec<RawPost>,
    /// Children on the page before filtering.
    pub child_count: usize,
    pub after: Option<String>,
}

/// Converts a search listing page, skipping posts that fail to deserialize.
pub fn parse_search_page(listing: RedditListing<Value>, web_base: &Url) -> SearchPage {
    let child_count = listing.data.children.len();
    let posts = listing
        .data
        .children
        .into_iter()
        .filter_map(|child| {
            if child.kind != "t3" {
                debug!("Skipping search child of kind '{}'", child.kind);
                return None;
            }
            match serde_json::from_value::<RedditPostData>(child.data) {
                Ok(post) => Some(post.into_raw_post(web_base)),
                Err(e) => {
                    warn!("Skipping malformed search result: {}", e);
                    None
                }
            }
        })
        .collect();

    SearchPage {
        posts,
        child_count,
        after: listing.data.after,
    }
}

/// Parses the `[post listing, comment listing]` pair returned by `/comments/{id}`.
///
/// The post listing is required. A missing or malformed comment listing yields
/// an empty forest, and individual malformed comments are skipped.
pub fn parse_thread(payload: Value, web_base: &Url) -> Result<RawThread, CoreError> {
    let mut parts = match payload {
        Value::Array(parts) => parts.into_iter(),
        _ => {
            return Err(RedditApiError::InvalidResponse {
                details: "thread payload is not an array".to_string(),
            }
            .into())
        }
    };

    let post_listing: RedditListing<RedditPostData> = parts
        .next()
        .ok_or_else(|| RedditApiError::InvalidResponse {
            details: "thread payload has no post listing".to_string(),
        })
        .and_then(|value| {
            serde_json::from_value(value).map_err(|e| RedditApiError::InvalidResponse {
                details: format!("malformed post listing: {}", e),
            })
        })?;

    let post = post_listing
        .data
        .children
        .into_iter()
        .next()
        .map(|child| child.data.into_raw_post(web_base))
        .ok_or_else(|| RedditApiError::InvalidResponse {
            details: "post listing is empty".to_string(),
        })?;

    let comments = match parts.next() {
        Some(listing) => parse_comment_forest(&listing),
        None => {
            warn!("Thread {} has no comment listing", post.id);
            Vec::new()
        }
    };

    Ok(RawThread { post, comments })
}

/// Converts a comment listing into a forest, keeping reply nesting.
pub fn parse_comment_forest(listing: &Value) -> Vec<RawComment> {
    let Some(children) = listing
        .get("data")
        .and_then(|data| data.get("children"))
        .and_then(Value::as_array)
    else {
        let no_replies = listing.is_null() || listing.as_str().is_some_and(str::is_empty);
        if !no_replies {
            warn!("Ignoring malformed comment listing");
        }
        return Vec::new();
    };

    children
        .iter()
        .filter_map(|child| {
            let kind = child.get("kind").and_then(Value::as_str).unwrap_or_default();
            if kind != "t1" {
                // "more" stubs point at comments that were not loaded
                debug!("Skipping listing child of kind '{}'", kind);
                return None;
            }

            let data = child.get("data")?.clone();
            match serde_json::from_value::<RedditCommentData>(data) {
                Ok(comment) => Some(
                    RawComment::new(comment.body, comment.score, comment.created_utc)
                        .with_replies(parse_comment_forest(&comment.replies)),
                ),
                Err(e) => {
                    warn!("Skipping malformed comment: {}", e);
                    None
                }
            }
        })
        .collect()
}

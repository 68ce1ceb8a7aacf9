use crate::listing::{parse_search_page, parse_thread, RedditListing};
use crate::metrics::{ApiMetrics, MetricsCollector, RequestMetrics};
use crate::rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::time::Instant;
use stocksense_core::{CoreError, RawPost, RawThread, RedditApiError, SearchRequest};
use tracing::{debug, error, info, warn};
use url::Url;

/// Reddit never returns more than this many children per listing page.
pub const MAX_PAGE_SIZE: usize = 100;

/// What a request targets, used for metrics routes and 404 mapping.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Search { forums: &'a str },
    Thread { post_id: &'a str },
}

impl Resource<'_> {
    pub fn route(&self) -> &'static str {
        match self {
            Resource::Search { .. } => "/r/{forums}/search",
            Resource::Thread { .. } => "/comments/{id}",
        }
    }

    fn not_found(&self) -> RedditApiError {
        match self {
            Resource::Search { forums } => RedditApiError::SubredditNotFound {
                subreddit: forums.to_string(),
            },
            Resource::Thread { post_id } => RedditApiError::PostNotFound {
                post_id: post_id.to_string(),
            },
        }
    }
}

impl std::fmt::Display for Resource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Search { forums } => write!(f, "r/{}", forums),
            Resource::Thread { post_id } => write!(f, "post {}", post_id),
        }
    }
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: RateLimiter,
    metrics: MetricsCollector,
    api_base: Url,
    web_base: Url,
}

impl RedditApiClient {
    pub fn new(http_client: Client, api_base: Url, web_base: Url) -> Self {
        Self {
            http_client,
            rate_limiter: RateLimiter::new(RateLimitConfig::reddit_oauth()),
            metrics: MetricsCollector::new(),
            api_base,
            web_base,
        }
    }

    pub async fn make_request(
        &self,
        method: Method,
        resource: Resource<'_>,
        endpoint: &str,
        access_token: &str,
        query_params: &[(&str, String)],
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.api_base.as_str().trim_end_matches('/'), endpoint);

        let _permit = self.rate_limiter.acquire_permit().await?;
        debug!("Acquired rate limit permit for {} {}", method, endpoint);

        let start_time = Instant::now();
        info!("Making Reddit API request: {} {}", method, endpoint);
        let sent = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token)
            .query(query_params)
            .send()
            .await;

        let status_code = sent.as_ref().ok().map(|response| response.status().as_u16());
        let result = match sent {
            Ok(response) if response.status().is_success() => {
                debug!("Request successful: {} {}", response.status(), endpoint);
                Ok(response)
            }
            Ok(response) => {
                error!(
                    "Request failed with status: {} for {}",
                    response.status(),
                    endpoint
                );
                Err(map_status(&response, resource).into())
            }
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    Err(CoreError::RedditApi(RedditApiError::RequestTimeout))
                } else {
                    Err(CoreError::Network(e))
                }
            }
        };

        self.metrics
            .record_request(RequestMetrics {
                route: resource.route().to_string(),
                status_code,
                response_time: start_time.elapsed(),
                success: result.is_ok(),
                rate_limited: status_code == Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
            })
            .await;

        result
    }

    /// Searches the given forums, following `after` cursors until `limit` posts are collected.
    pub async fn search_posts(
        &self,
        access_token: &str,
        request: &SearchRequest,
    ) -> Result<Vec<RawPost>, CoreError> {
        let forums = request.forums.join("+");
        let endpoint = format!("/r/{}/search", forums);
        let resource = Resource::Search { forums: &forums };

        let mut posts = Vec::with_capacity(request.limit.min(MAX_PAGE_SIZE));
        let mut after: Option<String> = None;

        while posts.len() < request.limit {
            let page_size = (request.limit - posts.len()).min(MAX_PAGE_SIZE);
            let mut params = vec![
                ("q", request.query.clone()),
                ("restrict_sr", "1".to_string()),
                ("sort", "relevance".to_string()),
                ("t", request.time_filter.as_str().to_string()),
                ("limit", page_size.to_string()),
                ("raw_json", "1".to_string()),
            ];
            if let Some(cursor) = &after {
                params.push(("after", cursor.clone()));
            }

            let response = self
                .make_request(Method::GET, resource, &endpoint, access_token, &params)
                .await?;

            let listing: RedditListing<Value> = response.json().await.map_err(|e| {
                error!("Failed to parse search results: {}", e);
                CoreError::RedditApi(RedditApiError::InvalidResponse {
                    details: format!("Failed to parse search results for r/{}", forums),
                })
            })?;

            let page = parse_search_page(listing, &self.web_base);
            let remaining = request.limit - posts.len();
            posts.extend(page.posts.into_iter().take(remaining));

            match page.after {
                Some(cursor) if page.child_count > 0 => after = Some(cursor),
                _ => break,
            }
        }

        info!(
            "Retrieved {} posts from r/{} for '{}'",
            posts.len(),
            forums,
            request.query
        );
        Ok(posts)
    }

    pub async fn fetch_thread(
        &self,
        access_token: &str,
        post_id: &str,
        comment_limit: usize,
    ) -> Result<RawThread, CoreError> {
        let endpoint = format!("/comments/{}", post_id);
        let params = [
            ("limit", comment_limit.to_string()),
            ("raw_json", "1".to_string()),
        ];

        let response = self
            .make_request(
                Method::GET,
                Resource::Thread { post_id },
                &endpoint,
                access_token,
                &params,
            )
            .await?;

        let payload: Value = response.json().await.map_err(|e| {
            error!("Failed to parse thread {}: {}", post_id, e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse thread {}", post_id),
            })
        })?;

        let thread = parse_thread(payload, &self.web_base)?;
        debug!(
            "Retrieved thread {} with {} top-level comments",
            post_id,
            thread.comments.len()
        );
        Ok(thread)
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.get_metrics().await
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.status().await
    }

    pub async fn reset_metrics(&self) {
        self.metrics.reset_metrics().await;
    }
}

fn map_status(response: &Response, resource: Resource<'_>) -> RedditApiError {
    let status = response.status();
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<f64>().ok())
                .map(|secs| secs.max(0.0).ceil() as u64)
                .unwrap_or(60);
            warn!("Rate limited, retry after {} seconds", retry_after);
            RedditApiError::RateLimitExceeded { retry_after }
        }
        StatusCode::UNAUTHORIZED => RedditApiError::InvalidToken,
        StatusCode::FORBIDDEN => RedditApiError::Forbidden {
            resource: resource.to_string(),
        },
        StatusCode::NOT_FOUND => resource.not_found(),
        status if status.is_server_error() => RedditApiError::ServerError {
            status_code: status.as_u16(),
        },
        status => RedditApiError::InvalidResponse {
            details: format!("unexpected status {}", status),
        },
    }
}

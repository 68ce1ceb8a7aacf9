pub mod api;
pub mod auth;
pub mod listing;
pub mod metrics;
pub mod rate_limiter;


use api::RedditApiClient;
use async_trait::async_trait;
use auth::{invalid_url, AppOnlyAuth};
use reqwest::Client;
use std::time::Duration;
use stocksense_core::{
    ConfigError, CoreError, PostSource, RawPost, RawThread, RedditApiError, RedditSettings,
    SearchRequest,
};
use tracing::debug;
use url::Url;

pub use api::Resource;
pub use auth::RedditToken;
pub use metrics::{ApiMetrics, RouteMetrics};
pub use rate_limiter::RateLimitStatus;

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub api_base: Url,
    pub token_url: Url,
    pub web_base: Url,
    pub request_timeout: Duration,
}

impl TryFrom<&RedditSettings> for RedditConfig {
    type Error = CoreError;

    fn try_from(settings: &RedditSettings) -> Result<Self, Self::Error> {
        let required = |value: &Option<String>, var_name: &str| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    CoreError::Config(ConfigError::MissingEnvironmentVariable {
                        var_name: var_name.to_string(),
                    })
                })
        };
        let parse = |field: &str, value: &str| Url::parse(value).map_err(|e| invalid_url(field, e));

        Ok(Self {
            client_id: required(&settings.client_id, "REDDIT_CLIENT_ID")?,
            client_secret: required(&settings.client_secret, "REDDIT_CLIENT_SECRET")?,
            user_agent: settings.user_agent.clone(),
            api_base: parse("reddit.api_base", &settings.api_base)?,
            token_url: parse("reddit.token_url", &settings.token_url)?,
            web_base: parse("reddit.web_base", &settings.web_base)?,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        })
    }
}

/// Read-only Reddit access with application-only OAuth.
#[derive(Debug)]
pub struct RedditClient {
    auth: AppOnlyAuth,
    api: RedditApiClient,
}

impl RedditClient {
    pub fn new(config: RedditConfig) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .build()
            .map_err(CoreError::Network)?;

        let auth = AppOnlyAuth::new(
            &config.client_id,
            &config.client_secret,
            &config.token_url,
            http_client.clone(),
        )?;
        let api = RedditApiClient::new(http_client, config.api_base, config.web_base);

        Ok(Self { auth, api })
    }

    pub async fn authenticate(&self) -> Result<(), CoreError> {
        self.auth.access_token().await.map(|_| ())
    }

    pub async fn cached_token(&self) -> Option<RedditToken> {
        self.auth.cached_token().await
    }

    pub async fn get_api_metrics(&self) -> ApiMetrics {
        self.api.get_metrics().await
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        self.api.get_rate_limit_status().await
    }

    /// Drops the cached token when Reddit rejected it, then hands the error back.
    async fn check_token<T>(&self, result: Result<T, CoreError>) -> Result<T, CoreError> {
        if let Err(CoreError::RedditApi(RedditApiError::InvalidToken)) = &result {
            self.auth.invalidate().await;
        }
        result
    }
}

#[async_trait]
impl PostSource for RedditClient {
    async fn search_posts(&self, request: &SearchRequest) -> Result<Vec<RawPost>, CoreError> {
        let token = self.auth.access_token().await?;
        debug!(
            "Searching {} forum(s) for '{}'",
            request.forums.len(),
            request.query
        );
        let result = self.api.search_posts(&token, request).await;
        self.check_token(result).await
    }

    async fn fetch_thread(
        &self,
        post: &RawPost,
        comment_limit: usize,
    ) -> Result<RawThread, CoreError> {
        let token = self.auth.access_token().await?;
        let result = self.api.fetch_thread(&token, &post.id, comment_limit).await;
        self.check_token(result).await
    }
}

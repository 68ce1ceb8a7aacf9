//! Application-only OAuth2 for Reddit (client-credentials grant).

use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError, TokenResponse,
    TokenUrl,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use stocksense_core::{CoreError, RedditApiError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// Tokens are refreshed this long before Reddit expires them.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);
/// Reddit issues one-day tokens when `expires_in` is missing.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }

    pub fn needs_refresh(&self) -> bool {
        SystemTime::now() + REFRESH_MARGIN >= self.expires_at
    }
}

pub struct AppOnlyAuth {
    oauth_client: BasicClient,
    http_client: Client,
    token: Mutex<Option<RedditToken>>,
}

impl AppOnlyAuth {
    /// `http_client` must already carry the User-Agent Reddit requires.
    pub fn new(
        client_id: &str,
        client_secret: &str,
        token_url: &Url,
        http_client: Client,
    ) -> Result<Self, CoreError> {
        let auth_url = token_url
            .join("authorize")
            .map_err(|e| invalid_url("token_url", e))?;

        let oauth_client = BasicClient::new(
            ClientId::new(client_id.to_string()),
            Some(ClientSecret::new(client_secret.to_string())),
            AuthUrl::from_url(auth_url),
            Some(TokenUrl::from_url(token_url.clone())),
        );

        Ok(Self {
            oauth_client,
            http_client,
            token: Mutex::new(None),
        })
    }

    /// Returns a cached bearer token, fetching a new one when missing or close to expiry.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if !token.needs_refresh() {
                return Ok(token.access_token.clone());
            }
            debug!("Cached Reddit token is about to expire, refreshing");
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drops the cached token so the next call re-authenticates.
    pub async fn invalidate(&self) {
        if self.token.lock().await.take().is_some() {
            warn!("Reddit rejected the cached token, it will be re-requested");
        }
    }

    pub async fn cached_token(&self) -> Option<RedditToken> {
        self.token.lock().await.clone()
    }

    async fn request_token(&self) -> Result<RedditToken, CoreError> {
        let http_client = self.http_client.clone();
        let response = self
            .oauth_client
            .exchange_client_credentials()
            .request_async(|request| send_token_request(http_client, request))
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(response) => {
                    CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                        reason: response.to_string(),
                    })
                }
                RequestTokenError::Request(e) if e.is_timeout() => {
                    CoreError::RedditApi(RedditApiError::RequestTimeout)
                }
                RequestTokenError::Request(e) => CoreError::Network(e),
                RequestTokenError::Parse(e, _) => {
                    CoreError::RedditApi(RedditApiError::InvalidResponse {
                        details: format!("token response: {}", e),
                    })
                }
                RequestTokenError::Other(reason) => {
                    CoreError::RedditApi(RedditApiError::AuthenticationFailed { reason })
                }
            })?;

        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let scope = response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();

        info!("Obtained Reddit application token valid for {:?}", lifetime);

        Ok(RedditToken {
            access_token: response.access_token().secret().clone(),
            expires_at: SystemTime::now() + lifetime,
            scope,
        })
    }
}

impl std::fmt::Debug for AppOnlyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppOnlyAuth").finish_non_exhaustive()
    }
}

/// Sends the token request through the shared client so it carries our User-Agent.
async fn send_token_request(
    http_client: Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = http_client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

pub(crate) fn invalid_url(field: &str, error: url::ParseError) -> CoreError {
    CoreError::Config(stocksense_core::ConfigError::InvalidValue {
        field: field.to_string(),
        value: error.to_string(),
    })
}

//! Application configuration.
//!
//! Values are resolved in order: compiled defaults, then a TOML file, then
//! environment variables. `AppConfig::load` runs the whole chain and validates
//! the result.

use crate::error::{ConfigError, CoreError};
use crate::types::{SentimentMode, TimeFilter};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_PATH_VAR: &str = "STOCKSENSE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "stocksense.toml";

pub const DEFAULT_FORUMS: [&str; 5] = [
    "stocks",
    "investing",
    "wallstreetbets",
    "pennystocks",
    "cryptostreetbets",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reddit: RedditSettings,
    pub collector: CollectorSettings,
    pub analysis: AnalysisSettings,
    pub market: MarketSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_agent: String,
    pub api_base: String,
    pub token_url: String,
    pub web_base: String,
    pub request_timeout_secs: u64,
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            user_agent: "stocksense/0.1 (sentiment analysis)".to_string(),
            api_base: "https://oauth.reddit.com".to_string(),
            token_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            web_base: "https://reddit.com".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorSettings {
    pub forums: Vec<String>,
    pub default_time_filter: TimeFilter,
    /// Upper bound on posts processed at the same time.
    pub max_concurrency: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            forums: DEFAULT_FORUMS.iter().map(|f| f.to_string()).collect(),
            default_time_filter: TimeFilter::Month,
            max_concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub sentiment_mode: SentimentMode,
    pub include_comment_stats: bool,
    pub default_post_limit: usize,
    pub default_max_comments: usize,
    pub timeout_secs: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            sentiment_mode: SentimentMode::Blended,
            include_comment_stats: true,
            default_post_limit: 100,
            default_max_comments: 10,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    pub base_url: String,
    pub range: String,
    pub interval: String,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            range: "1mo".to_string(),
            interval: "1d".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
        }
    }
}

impl AppConfig {
    /// Resolves, parses, overrides from the process environment, and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut config = match Self::resolve_path(path)? {
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CoreError::Config(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }),
            _ => CoreError::Io(e),
        })?;

        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CoreError> {
        toml::from_str(content).map_err(|e| CoreError::Config(ConfigError::Parse(e)))
    }

    /// Applies environment overrides through `lookup` so callers control the source.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(client_id) = lookup("REDDIT_CLIENT_ID") {
            self.reddit.client_id = Some(client_id);
        }
        if let Some(client_secret) = lookup("REDDIT_CLIENT_SECRET") {
            self.reddit.client_secret = Some(client_secret);
        }
        if let Some(user_agent) = lookup("REDDIT_USER_AGENT") {
            self.reddit.user_agent = user_agent;
        }
        if let Some(bind_addr) = lookup("STOCKSENSE_BIND_ADDR") {
            self.server.bind_addr = bind_addr;
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        require_env_value(&self.reddit.client_id, "REDDIT_CLIENT_ID")?;
        require_env_value(&self.reddit.client_secret, "REDDIT_CLIENT_SECRET")?;

        if self.reddit.user_agent.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "reddit.user_agent".to_string(),
            }
            .into());
        }
        if self.collector.forums.iter().all(|f| f.trim().is_empty()) {
            return Err(ConfigError::MissingField {
                field: "collector.forums".to_string(),
            }
            .into());
        }

        let positive = [
            ("collector.max_concurrency", self.collector.max_concurrency),
            ("analysis.default_post_limit", self.analysis.default_post_limit),
            ("analysis.timeout_secs", self.analysis.timeout_secs as usize),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    fn resolve_path(explicit: Option<&Path>) -> Result<Option<PathBuf>, CoreError> {
        if let Some(path) = explicit {
            return Ok(Some(path.to_path_buf()));
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
            return Ok(Some(PathBuf::from(path)));
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        Ok(local.exists().then_some(local))
    }
}

fn require_env_value(value: &Option<String>, var_name: &str) -> Result<(), CoreError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::MissingEnvironmentVariable {
            var_name: var_name.to_string(),
        }
        .into()),
    }
}

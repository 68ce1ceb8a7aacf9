use crate::error::*;
use tracing::{error, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    /// Whether a later identical request could plausibly succeed.
    fn is_transient(&self) -> bool;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::RedditApi(e) => {
                error!("Reddit API error details: {:?}", e);
            }
            CoreError::MarketData(e) => {
                error!("Market data error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_transient(&self) -> bool {
        match self {
            CoreError::RedditApi(e) => e.is_transient(),
            CoreError::MarketData(e) => e.is_transient(),
            CoreError::Analysis(e) => e.is_transient(),
            CoreError::Network(_) => true,
            CoreError::Timeout { .. } => true,
            _ => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::MarketData(e) => e.user_friendly_message(),
            CoreError::Analysis(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::InvalidInput { message } => format!("Invalid input: {}", message),
            CoreError::Timeout { .. } => {
                "The operation took too long to complete. Please try again.".to_string()
            }
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.error_code(),
            CoreError::MarketData(e) => e.error_code(),
            CoreError::Analysis(e) => e.error_code(),
            CoreError::Config(e) => e.error_code(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            CoreError::Timeout { .. } => "TIMEOUT".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for RedditApiError {
    fn log_error(&self) -> &Self {
        error!("RedditApiError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("RedditApiError (warning): {}", self);
        self
    }

    fn is_transient(&self) -> bool {
        match self {
            RedditApiError::RateLimitExceeded { .. } => true,
            RedditApiError::RequestTimeout => true,
            RedditApiError::ServerError { status_code } => *status_code >= 500,
            _ => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => {
                "Reddit authentication failed. Please check your credentials.".to_string()
            }
            RedditApiError::RateLimitExceeded { retry_after } => format!(
                "Too many requests. Please wait {} seconds before trying again.",
                retry_after
            ),
            RedditApiError::Forbidden { resource } => format!(
                "Access denied to {}. The subreddit may be private or quarantined.",
                resource
            ),
            RedditApiError::SubredditNotFound { subreddit } => {
                format!("Subreddit '{}' not found or is private.", subreddit)
            }
            RedditApiError::PostNotFound { .. } => {
                "The requested post could not be found.".to_string()
            }
            RedditApiError::InvalidToken => {
                "Reddit authentication token is invalid. Please check the app credentials."
                    .to_string()
            }
            RedditApiError::RequestTimeout => {
                "Request to Reddit timed out. Please try again.".to_string()
            }
            _ => "Reddit API error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => "REDDIT_AUTH_FAILED".to_string(),
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT".to_string(),
            RedditApiError::Forbidden { .. } => "REDDIT_FORBIDDEN".to_string(),
            RedditApiError::SubredditNotFound { .. } => "REDDIT_SUBREDDIT_NOT_FOUND".to_string(),
            RedditApiError::PostNotFound { .. } => "REDDIT_POST_NOT_FOUND".to_string(),
            RedditApiError::InvalidToken => "REDDIT_INVALID_TOKEN".to_string(),
            RedditApiError::RequestTimeout => "REDDIT_TIMEOUT".to_string(),
            RedditApiError::InvalidResponse { .. } => "REDDIT_INVALID_RESPONSE".to_string(),
            RedditApiError::ServerError { .. } => "REDDIT_SERVER_ERROR".to_string(),
        }
    }
}

impl ErrorExt for MarketDataError {
    fn log_error(&self) -> &Self {
        error!("MarketDataError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("MarketDataError (warning): {}", self);
        self
    }

    fn is_transient(&self) -> bool {
        matches!(
            self,
            MarketDataError::ProviderRejected { status_code } if *status_code == 429 || *status_code >= 500
        )
    }

    fn user_friendly_message(&self) -> String {
        match self {
            MarketDataError::SymbolNotFound { symbol } => {
                format!("No price data available for '{}'.", symbol)
            }
            MarketDataError::ProviderRejected { .. } => {
                "The price data provider is unavailable. Please try again later.".to_string()
            }
            MarketDataError::InvalidResponse { .. } => {
                "The price data provider returned an unexpected response.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            MarketDataError::SymbolNotFound { .. } => "MARKET_SYMBOL_NOT_FOUND".to_string(),
            MarketDataError::ProviderRejected { .. } => "MARKET_PROVIDER_REJECTED".to_string(),
            MarketDataError::InvalidResponse { .. } => "MARKET_INVALID_RESPONSE".to_string(),
        }
    }
}

impl ErrorExt for AnalysisError {
    fn log_error(&self) -> &Self {
        error!("AnalysisError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("AnalysisError (warning): {}", self);
        self
    }

    fn is_transient(&self) -> bool {
        matches!(
            self,
            AnalysisError::DataSource { .. } | AnalysisError::TimedOut { .. }
        )
    }

    fn user_friendly_message(&self) -> String {
        match self {
            AnalysisError::NoResults { symbol } => format!(
                "No Reddit posts mention {} in the selected time period.",
                symbol
            ),
            AnalysisError::MissingSymbol => "Please enter a stock symbol.".to_string(),
            AnalysisError::TimedOut { .. } => {
                "The analysis took too long to complete. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            AnalysisError::DataSource { .. } => "ANALYSIS_DATA_SOURCE".to_string(),
            AnalysisError::NoResults { .. } => "ANALYSIS_NO_RESULTS".to_string(),
            AnalysisError::ItemProcessing { .. } => "ANALYSIS_ITEM_FAILED".to_string(),
            AnalysisError::MissingSymbol => "ANALYSIS_MISSING_SYMBOL".to_string(),
            AnalysisError::TimedOut { .. } => "ANALYSIS_TIMEOUT".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_transient(&self) -> bool {
        false
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file '{}' not found.", path)
            }
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => format!(
                "Environment variable '{}' is required but not set.",
                var_name
            ),
            ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

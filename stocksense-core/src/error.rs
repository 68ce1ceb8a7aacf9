use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Reddit API error: {0}")]
    RedditApi(#[from] RedditApiError),

    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Operation timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum RedditApiError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Subreddit not found: {subreddit}")]
    SubredditNotFound { subreddit: String },

    #[error("Post not found: {post_id}")]
    PostNotFound { post_id: String },

    #[error("Invalid OAuth token")]
    InvalidToken,

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },
}

#[derive(Error, Debug, Clone)]
pub enum MarketDataError {
    #[error("Symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("Price provider rejected request: {status_code}")]
    ProviderRejected { status_code: u16 },

    #[error("Invalid price response: {details}")]
    InvalidResponse { details: String },
}

/// Failures that end a sentiment analysis run early.
///
/// `DataSource` and `NoResults` produce a failed envelope; `ItemProcessing`
/// only ever drops the item it names.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Error with request: {reason}")]
    DataSource { reason: String },

    #[error("No posts found for {symbol}")]
    NoResults { symbol: String },

    #[error("Failed to process {item}: {reason}")]
    ItemProcessing { item: String, reason: String },

    #[error("No stock symbol provided")]
    MissingSymbol,

    #[error("Analysis timed out after {seconds} seconds")]
    TimedOut { seconds: f64 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}

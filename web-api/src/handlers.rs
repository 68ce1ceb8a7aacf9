use analysis_service::{AnalysisPipeline, AnalysisRequest};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Form, Json,
};
use market_data::{PriceSource, StockSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use stocksense_core::{AggregateResult, AnalysisError, AnalysisSettings, ErrorExt, TimeFilter};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AnalysisPipeline>,
    pub prices: Arc<dyn PriceSource>,
    pub analysis: AnalysisSettings,
    pub default_time_filter: TimeFilter,
}

impl AppState {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.analysis.timeout_secs)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Raw form fields; numbers are parsed by hand so bad input maps to 400.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeForm {
    pub stock_symbol: Option<String>,
    pub time_filter: Option<String>,
    pub limit: Option<String>,
    pub max_comments: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisParameters {
    pub time_filter: TimeFilter,
    pub posts_limit: usize,
    pub comments_per_post: usize,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StockData {
    Snapshot(StockSnapshot),
    Unavailable { error: String },
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub stock_symbol: String,
    pub sentiment: AggregateResult,
    pub stock_data: StockData,
    pub analysis_parameters: AnalysisParameters,
}

/// Aborts the spawned analysis when the request future is dropped, e.g. on
/// client disconnect.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn parse_count(field: &str, value: Option<&str>, default: usize) -> Result<usize, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("invalid {}: '{}'", field, raw))),
    }
}

pub async fn analyze(
    State(state): State<AppState>,
    Form(form): Form<AnalyzeForm>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let symbol = form
        .stock_symbol
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_uppercase();
    let time_filter = form
        .time_filter
        .as_deref()
        .map(|value| TimeFilter::parse_or(value, state.default_time_filter))
        .unwrap_or(state.default_time_filter);
    let posts_limit = parse_count(
        "limit",
        form.limit.as_deref(),
        state.analysis.default_post_limit,
    )?;
    let comments_per_post = parse_count(
        "max_comments",
        form.max_comments.as_deref(),
        state.analysis.default_max_comments,
    )?;

    info!(
        "Analyze request for '{}' ({}, {} posts, {} comments each)",
        symbol, time_filter, posts_limit, comments_per_post
    );

    let request = AnalysisRequest::new(symbol.clone(), time_filter)
        .with_post_limit(posts_limit)
        .with_max_comments(comments_per_post);

    // A pipeline panic comes back as a JoinError
    let pipeline = state.pipeline.clone();
    let timeout = state.timeout();
    let analysis = AbortOnDrop(tokio::spawn(async move {
        pipeline.analyze_with_timeout(request, timeout).await
    }));

    let (sentiment, stock_data) = tokio::join!(analysis, fetch_stock_data(&state, &symbol));

    let sentiment = sentiment.map_err(|e| {
        error!("Analysis task failed: {}", e);
        ApiError::Internal(format!("analysis failed: {}", e))
    })?;

    Ok(Json(AnalyzeResponse {
        stock_symbol: symbol,
        sentiment,
        stock_data,
        analysis_parameters: AnalysisParameters {
            time_filter,
            posts_limit,
            comments_per_post,
        },
    }))
}

async fn fetch_stock_data(state: &AppState, symbol: &str) -> StockData {
    if symbol.is_empty() {
        return StockData::Unavailable {
            error: AnalysisError::MissingSymbol.to_string(),
        };
    }

    match state.prices.fetch_quote(symbol).await {
        Ok(snapshot) => StockData::Snapshot(snapshot),
        Err(e) => StockData::Unavailable {
            error: e.log_warn().user_friendly_message(),
        },
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

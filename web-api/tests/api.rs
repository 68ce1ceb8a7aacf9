use analysis_service::AnalysisPipeline;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use market_data::{PriceSource, StockSnapshot};
use sentiment_engine::{Aggregator, AggregatorConfig, SentimentScorer};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stocksense_core::{
    AnalysisSettings, CollectorSettings, CoreError, MarketDataError, PostSource, RawComment,
    RawPost, RawThread, SearchRequest, TimeFilter,
};
use tower::ServiceExt;
use web_api::{ApiServer, AppState};

struct OnePostSource;

#[async_trait]
impl PostSource for OnePostSource {
    async fn search_posts(&self, request: &SearchRequest) -> Result<Vec<RawPost>, CoreError> {
        if request.query != "ABC stock" {
            return Ok(Vec::new());
        }
        Ok(vec![RawPost {
            id: "p1".to_string(),
            title: "ABC looks good".to_string(),
            body: String::new(),
            score: 42,
            created_utc: 1_700_000_000.0,
            permalink: "https://reddit.com/r/stocks/comments/p1/".to_string(),
            forum: "stocks".to_string(),
        }])
    }

    async fn fetch_thread(
        &self,
        post: &RawPost,
        _comment_limit: usize,
    ) -> Result<RawThread, CoreError> {
        Ok(RawThread {
            post: post.clone(),
            comments: vec![RawComment::new("good", 3, 1_700_000_100.0)],
        })
    }
}

struct FixedPrices;

#[async_trait]
impl PriceSource for FixedPrices {
    async fn fetch_quote(&self, symbol: &str) -> Result<StockSnapshot, CoreError> {
        if symbol != "ABC" {
            return Err(MarketDataError::SymbolNotFound {
                symbol: symbol.to_string(),
            }
            .into());
        }
        Ok(StockSnapshot::new(
            "ABC".to_string(),
            Some("USD".to_string()),
            11.0,
            Some(10.0),
            Vec::new(),
        ))
    }
}

fn word_scorer(text: &str) -> Result<f64, CoreError> {
    Ok(if text.to_lowercase().contains("good") {
        0.5
    } else {
        0.0
    })
}

/// Records whether a search ever ran to completion.
struct SlowSource {
    finished: Arc<AtomicBool>,
}

#[async_trait]
impl PostSource for SlowSource {
    async fn search_posts(&self, _request: &SearchRequest) -> Result<Vec<RawPost>, CoreError> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(Vec::new())
    }

    async fn fetch_thread(
        &self,
        post: &RawPost,
        _comment_limit: usize,
    ) -> Result<RawThread, CoreError> {
        Ok(RawThread {
            post: post.clone(),
            comments: Vec::new(),
        })
    }
}

fn app() -> Router {
    app_with(Arc::new(OnePostSource))
}

fn app_with(source: Arc<dyn PostSource>) -> Router {
    let aggregator = Aggregator::new(
        SentimentScorer::new(word_scorer as fn(&str) -> Result<f64, CoreError>),
        AggregatorConfig::default(),
    );
    let pipeline = AnalysisPipeline::new(
        source,
        Arc::new(aggregator),
        &CollectorSettings::default(),
    );

    ApiServer::new(AppState {
        pipeline: Arc::new(pipeline),
        prices: Arc::new(FixedPrices),
        analysis: AnalysisSettings::default(),
        default_time_filter: TimeFilter::Month,
    })
    .router()
}

fn form_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({"status": "ok"}));
}

#[tokio::test]
async fn test_analyze_returns_sentiment_and_prices() {
    let response = app()
        .oneshot(form_request(
            "stock_symbol=abc&time_filter=week&limit=5&max_comments=3",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    assert_eq!(body["stock_symbol"], "ABC");
    assert_eq!(body["sentiment"]["success"], true);
    assert_eq!(body["sentiment"]["post_count"], 1);
    assert_eq!(body["sentiment"]["average_sentiment"], 0.5);
    assert_eq!(body["sentiment"]["time_period"], "week");
    assert_eq!(body["sentiment"]["top_posts"][0]["subreddit"], "stocks");
    assert_eq!(body["stock_data"]["current_price"], 11.0);
    assert_eq!(body["stock_data"]["change"], 1.0);
    assert_eq!(body["analysis_parameters"]["time_filter"], "week");
    assert_eq!(body["analysis_parameters"]["posts_limit"], 5);
    assert_eq!(body["analysis_parameters"]["comments_per_post"], 3);
}

#[tokio::test]
async fn test_analyze_defaults_and_unknown_symbol() {
    let response = app()
        .oneshot(form_request("stock_symbol=xyz&time_filter=fortnight"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    assert_eq!(body["sentiment"]["success"], false);
    assert_eq!(body["sentiment"]["error"], "No posts found for XYZ");
    assert!(body["stock_data"]["error"].is_string());
    assert_eq!(body["analysis_parameters"]["time_filter"], "month");
    assert_eq!(body["analysis_parameters"]["posts_limit"], 100);
    assert_eq!(body["analysis_parameters"]["comments_per_post"], 10);
}

#[tokio::test]
async fn test_analyze_rejects_bad_numbers() {
    let response = app()
        .oneshot(form_request("stock_symbol=ABC&limit=many"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "invalid limit: 'many'");
}

#[tokio::test]
async fn test_analyze_without_symbol() {
    let response = app().oneshot(form_request("")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["sentiment"]["error"], "No stock symbol provided");
    assert_eq!(body["stock_data"]["error"], "No stock symbol provided");
}

#[tokio::test]
async fn test_dropped_request_stops_analysis() {
    let finished = Arc::new(AtomicBool::new(false));
    let app = app_with(Arc::new(SlowSource {
        finished: finished.clone(),
    }));

    let pending = tokio::time::timeout(
        Duration::from_millis(50),
        app.oneshot(form_request("stock_symbol=ABC")),
    )
    .await;
    assert!(pending.is_err());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!finished.load(Ordering::SeqCst));
}

use analysis_service::AnalysisPipeline;
use anyhow::Context;
use market_data::{MarketDataConfig, YahooFinanceClient};
use reddit_client::{RedditClient, RedditConfig};
use sentiment_engine::{Aggregator, AggregatorConfig, SentimentScorer};
use std::path::PathBuf;
use std::sync::Arc;
use stocksense_core::AppConfig;
use tracing_subscriber::EnvFilter;
use web_api::{ApiServer, AppState};

const DEFAULT_LOG_FILTER: &str =
    "stocksense=info,web_api=info,analysis_service=info,reddit_client=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    tracing::info!("Starting StockSense - Reddit stock sentiment");

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config =
        AppConfig::load(config_path.as_deref()).context("failed to load configuration")?;

    let reddit = RedditClient::new(RedditConfig::try_from(&config.reddit)?)
        .context("failed to create Reddit client")?;
    let prices = YahooFinanceClient::new(MarketDataConfig::from(&config.market))
        .context("failed to create market data client")?;

    let aggregator = Aggregator::new(
        SentimentScorer::default(),
        AggregatorConfig {
            mode: config.analysis.sentiment_mode,
            include_comment_stats: config.analysis.include_comment_stats,
        },
    );
    let pipeline = AnalysisPipeline::new(Arc::new(reddit), Arc::new(aggregator), &config.collector);

    let state = AppState {
        pipeline: Arc::new(pipeline),
        prices: Arc::new(prices),
        analysis: config.analysis.clone(),
        default_time_filter: config.collector.default_time_filter,
    };

    ApiServer::new(state)
        .serve(&config.server.bind_addr)
        .await
        .context("web server stopped")?;

    Ok(())
}

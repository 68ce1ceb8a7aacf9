use crate::collector::PostCollector;
use sentiment_engine::{Aggregator, PolarityScorer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use stocksense_core::{
    AggregateResult, AnalysisError, AnalysisSettings, CollectedPost, CollectorSettings, ErrorExt,
    Post, PostSource, TimeFilter,
};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Per-post scoring and the final roll-up, as seen by the pipeline.
pub trait PostScoring: Send + Sync {
    fn score_post(&self, collected: CollectedPost) -> Result<Post, AnalysisError>;

    fn summarize(&self, symbol: &str, time_period: TimeFilter, posts: Vec<Post>)
        -> AggregateResult;
}

impl<P: PolarityScorer> PostScoring for Aggregator<P> {
    fn score_post(&self, collected: CollectedPost) -> Result<Post, AnalysisError> {
        Aggregator::score_post(self, collected)
    }

    fn summarize(
        &self,
        symbol: &str,
        time_period: TimeFilter,
        posts: Vec<Post>,
    ) -> AggregateResult {
        Aggregator::summarize(self, symbol, time_period, posts)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub symbol: String,
    pub time_filter: TimeFilter,
    pub post_limit: usize,
    pub max_comments_per_post: usize,
}

impl AnalysisRequest {
    pub fn new(symbol: impl Into<String>, time_filter: TimeFilter) -> Self {
        let defaults = AnalysisSettings::default();
        Self {
            symbol: symbol.into(),
            time_filter,
            post_limit: defaults.default_post_limit,
            max_comments_per_post: defaults.default_max_comments,
        }
    }

    pub fn with_post_limit(mut self, post_limit: usize) -> Self {
        self.post_limit = post_limit;
        self
    }

    pub fn with_max_comments(mut self, max_comments: usize) -> Self {
        self.max_comments_per_post = max_comments;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Collecting,
    Scoring,
    Aggregating,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Collecting => "collecting",
            PipelineStage::Scoring => "scoring",
            PipelineStage::Aggregating => "aggregating",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn enter(stage: PipelineStage) {
    info!(%stage, "Pipeline stage");
}

/// Symbol in, one aggregate result out. Holds no per-run state.
#[derive(Clone)]
pub struct AnalysisPipeline {
    collector: PostCollector,
    scoring: Arc<dyn PostScoring>,
}

impl AnalysisPipeline {
    pub fn new(
        source: Arc<dyn PostSource>,
        scoring: Arc<dyn PostScoring>,
        settings: &CollectorSettings,
    ) -> Self {
        Self {
            collector: PostCollector::new(source, settings),
            scoring,
        }
    }

    pub fn collector(&self) -> &PostCollector {
        &self.collector
    }

    pub async fn analyze(&self, request: AnalysisRequest) -> AggregateResult {
        let span = info_span!(
            "analysis",
            run_id = %Uuid::new_v4(),
            symbol = %request.symbol.trim().to_uppercase(),
        );
        self.run(request).instrument(span).await
    }

    /// Like [`analyze`](Self::analyze), but gives up after `timeout`. In-flight
    /// fetches are aborted and partial work is discarded.
    pub async fn analyze_with_timeout(
        &self,
        request: AnalysisRequest,
        timeout: Duration,
    ) -> AggregateResult {
        let time_filter = request.time_filter;
        match tokio::time::timeout(timeout, self.analyze(request)).await {
            Ok(result) => result,
            Err(_) => {
                let error = AnalysisError::TimedOut {
                    seconds: timeout.as_secs_f64(),
                };
                error.log_warn();
                enter(PipelineStage::Failed);
                AggregateResult::failure(time_filter, &error)
            }
        }
    }

    async fn run(&self, request: AnalysisRequest) -> AggregateResult {
        let AnalysisRequest {
            symbol,
            time_filter,
            post_limit,
            max_comments_per_post,
        } = request;
        let symbol = symbol.trim().to_uppercase();

        enter(PipelineStage::Collecting);
        if symbol.is_empty() {
            return fail(time_filter, AnalysisError::MissingSymbol);
        }

        let raw_posts = match self.collector.search(&symbol, time_filter, post_limit).await {
            Ok(posts) => posts,
            Err(e) => return fail(time_filter, e),
        };

        enter(PipelineStage::Scoring);
        let found = raw_posts.len();
        let scoring = self.scoring.clone();
        let posts = self
            .collector
            .collect_threads(raw_posts, max_comments_per_post, move |collected| {
                scoring.score_post(collected)
            })
            .await;

        if posts.len() < found {
            warn!("{} of {} posts were dropped", found - posts.len(), found);
        }

        enter(PipelineStage::Aggregating);
        let result = self.scoring.summarize(&symbol, time_filter, posts);

        enter(if result.success {
            PipelineStage::Done
        } else {
            PipelineStage::Failed
        });
        result
    }
}

fn fail(time_filter: TimeFilter, error: AnalysisError) -> AggregateResult {
    error.log_warn();
    enter(PipelineStage::Failed);
    AggregateResult::failure(time_filter, &error)
}

impl fmt::Debug for AnalysisPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisPipeline")
            .field("collector", &self.collector)
            .finish_non_exhaustive()
    }
}

use analysis_service::{AnalysisPipeline, AnalysisRequest, PostCollector};
use async_trait::async_trait;
use sentiment_engine::{Aggregator, AggregatorConfig, SentimentScorer};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stocksense_core::{
    AnalysisError, CollectorSettings, CoreError, PostSource, RawComment, RawPost, RawThread,
    RedditApiError, SearchRequest, SentimentMode, TimeFilter,
};

#[derive(Default)]
struct FakeSource {
    posts: Vec<RawPost>,
    threads: HashMap<String, Vec<RawComment>>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    search_fails: bool,
    delay: Duration,
    searches: Mutex<Vec<SearchRequest>>,
    comment_limits: Mutex<Vec<usize>>,
}

impl FakeSource {
    fn with_post(mut self, id: &str, title: &str, score: i64, comments: &[&str]) -> Self {
        self.posts.push(RawPost {
            id: id.to_string(),
            title: title.to_string(),
            body: String::new(),
            score,
            created_utc: 1_700_000_000.0,
            permalink: format!("https://reddit.com/r/stocks/comments/{}/", id),
            forum: "stocks".to_string(),
        });
        self.threads.insert(
            id.to_string(),
            comments
                .iter()
                .map(|body| RawComment::new(*body, 1, 1_700_000_100.0))
                .collect(),
        );
        self
    }
}

#[async_trait]
impl PostSource for FakeSource {
    async fn search_posts(&self, request: &SearchRequest) -> Result<Vec<RawPost>, CoreError> {
        self.searches.lock().unwrap().push(request.clone());
        if self.search_fails {
            return Err(RedditApiError::ServerError { status_code: 503 }.into());
        }
        Ok(self.posts.iter().take(request.limit).cloned().collect())
    }

    async fn fetch_thread(
        &self,
        post: &RawPost,
        comment_limit: usize,
    ) -> Result<RawThread, CoreError> {
        self.comment_limits.lock().unwrap().push(comment_limit);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panicking.contains(&post.id) {
            panic!("parser blew up on {}", post.id);
        }
        if self.failing.contains(&post.id) {
            return Err(RedditApiError::RequestTimeout.into());
        }
        Ok(RawThread {
            post: post.clone(),
            comments: self.threads.get(&post.id).cloned().unwrap_or_default(),
        })
    }
}

fn word_scorer(text: &str) -> Result<f64, CoreError> {
    let mut score: f64 = 0.0;
    for word in text.split_whitespace() {
        match word.to_lowercase().as_str() {
            "good" => score += 0.5,
            "bad" => score -= 0.5,
            _ => {}
        }
    }
    Ok(score)
}

fn pipeline(source: FakeSource) -> (AnalysisPipeline, Arc<FakeSource>) {
    let source = Arc::new(source);
    let aggregator = Aggregator::new(
        SentimentScorer::new(word_scorer as fn(&str) -> Result<f64, CoreError>),
        AggregatorConfig {
            mode: SentimentMode::Blended,
            include_comment_stats: true,
        },
    );
    let pipeline = AnalysisPipeline::new(
        source.clone(),
        Arc::new(aggregator),
        &CollectorSettings::default(),
    );
    (pipeline, source)
}

#[tokio::test]
async fn test_analyze_scores_and_ranks_posts() {
    let source = FakeSource::default()
        .with_post("p1", "ABC good quarter", 10, &["good call", "bad timing"])
        .with_post("p2", "ABC bad guidance", 50, &[])
        .with_post("p3", "ABC earnings", 30, &["meh"]);
    let (pipeline, source) = pipeline(source);

    let result = pipeline
        .analyze(AnalysisRequest::new(" abc ", TimeFilter::Week).with_post_limit(10))
        .await;

    assert!(result.success);
    assert_eq!(result.error, None);
    assert_eq!(result.post_count, 3);
    assert_eq!(result.time_period, TimeFilter::Week);
    assert_eq!(result.total_comments_analyzed, Some(3));

    // p1: (0.5 + 0.5 - 0.5) / 3, p2: -0.5, p3: 0.0
    let expected = (1.0 / 6.0 - 0.5 + 0.0) / 3.0;
    assert!((result.average_sentiment - expected).abs() < 1e-9);
    assert_eq!(result.sentiment_distribution.positive, 1);
    assert_eq!(result.sentiment_distribution.negative, 1);
    assert_eq!(result.sentiment_distribution.neutral, 1);

    let ranked: Vec<i64> = result.top_posts.iter().map(|p| p.score).collect();
    assert_eq!(ranked, vec![50, 30, 10]);

    let searches = source.searches.lock().unwrap();
    assert_eq!(searches[0].query, "ABC stock");
    assert_eq!(searches[0].limit, 10);
    assert_eq!(searches[0].forums.len(), 5);
}

#[tokio::test]
async fn test_zero_posts_is_failure_envelope() {
    let (pipeline, _) = pipeline(FakeSource::default());

    let result = pipeline
        .analyze(AnalysisRequest::new("XYZ", TimeFilter::Month))
        .await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("No posts found for XYZ"));
    assert_eq!(result.post_count, 0);
    assert!(result.top_posts.is_empty());
}

#[tokio::test]
async fn test_failed_and_panicking_posts_are_dropped() {
    let mut source = FakeSource::default()
        .with_post("p1", "ABC one", 1, &[])
        .with_post("p2", "ABC two", 2, &[])
        .with_post("p3", "ABC three", 3, &[])
        .with_post("p4", "ABC four", 4, &[]);
    source.failing.insert("p2".to_string());
    source.panicking.insert("p3".to_string());
    let (pipeline, _) = pipeline(source);

    let result = pipeline
        .analyze(AnalysisRequest::new("ABC", TimeFilter::Day))
        .await;

    assert!(result.success);
    assert_eq!(result.post_count, 2);
    let titles: Vec<&str> = result.top_posts.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["ABC four", "ABC one"]);
}

#[tokio::test]
async fn test_comment_cap_applies_per_post() {
    let source = FakeSource::default().with_post(
        "p1",
        "ABC",
        1,
        &["good", "good", "bad", "bad", "bad"],
    );
    let (pipeline, source) = pipeline(source);

    let result = pipeline
        .analyze(AnalysisRequest::new("ABC", TimeFilter::Day).with_max_comments(2))
        .await;

    assert!(result.success);
    assert_eq!(result.top_posts[0].comment_count, 2);
    assert_eq!(result.total_comments_analyzed, Some(2));
    // Only the first two comments count: (0.0 + 0.5 + 0.5) / 3
    assert!((result.average_sentiment - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(*source.comment_limits.lock().unwrap(), vec![2]);
}

#[tokio::test]
async fn test_search_failure_is_data_source_error() {
    let source = FakeSource {
        search_fails: true,
        ..FakeSource::default()
    };
    let (pipeline, _) = pipeline(source);

    let result = pipeline
        .analyze(AnalysisRequest::new("ABC", TimeFilter::Month))
        .await;

    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.starts_with("Error with request:"), "got {}", error);
}

#[tokio::test]
async fn test_blank_symbol_is_rejected_without_fetching() {
    let (pipeline, source) = pipeline(FakeSource::default().with_post("p1", "ABC", 1, &[]));

    let result = pipeline
        .analyze(AnalysisRequest::new("   ", TimeFilter::Month))
        .await;

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some(AnalysisError::MissingSymbol.to_string().as_str())
    );
    assert!(source.searches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_timeout_discards_partial_work() {
    let source = FakeSource {
        delay: Duration::from_secs(5),
        ..FakeSource::default()
    }
    .with_post("p1", "ABC good", 1, &[]);
    let (pipeline, _) = pipeline(source);

    let started = std::time::Instant::now();
    let result = pipeline
        .analyze_with_timeout(
            AnalysisRequest::new("ABC", TimeFilter::Month),
            Duration::from_secs(1),
        )
        .await;

    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Analysis timed out after 1 seconds")
    );
    assert_eq!(result.post_count, 0);
}

#[tokio::test]
async fn test_sub_second_timeout_is_reported_precisely() {
    let source = FakeSource {
        delay: Duration::from_secs(5),
        ..FakeSource::default()
    }
    .with_post("p1", "ABC good", 1, &[]);
    let (pipeline, _) = pipeline(source);

    let result = pipeline
        .analyze_with_timeout(
            AnalysisRequest::new("ABC", TimeFilter::Month),
            Duration::from_millis(250),
        )
        .await;

    assert_eq!(
        result.error.as_deref(),
        Some("Analysis timed out after 0.25 seconds")
    );
}

#[tokio::test]
async fn test_collect_threads_keeps_search_order() {
    let mut source = FakeSource::default()
        .with_post("p1", "ABC one", 1, &["x"])
        .with_post("p2", "ABC two", 2, &["y"])
        .with_post("p3", "ABC three", 3, &["z"]);
    source.failing.insert("p2".to_string());
    let source: Arc<dyn PostSource> = Arc::new(source);

    let collector = PostCollector::new(source, &CollectorSettings::default());
    let found = collector.search("abc", TimeFilter::Year, 10).await.unwrap();
    let collected = collector.collect_threads(found, 5, |collected| Ok(collected)).await;

    let ids: Vec<&str> = collected.iter().map(|c| c.post.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p3"]);
    assert_eq!(collected[1].comments[0].body, "z");
}

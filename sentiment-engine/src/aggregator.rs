//! Per-post scoring and per-symbol roll-up.

use crate::scorer::{PolarityScorer, SentimentScorer};
use chrono::{DateTime, Utc};
use stocksense_core::{
    AggregateResult, AnalysisError, CollectedPost, Comment, Post, SentimentCategory,
    SentimentDistribution, SentimentMode, TimeFilter, MAX_TOP_POSTS,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorConfig {
    pub mode: SentimentMode,
    /// Adds the comment-level average and comment total to the result.
    pub include_comment_stats: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            mode: SentimentMode::Blended,
            include_comment_stats: true,
        }
    }
}

pub struct Aggregator<P> {
    scorer: SentimentScorer<P>,
    config: AggregatorConfig,
}

impl<P: PolarityScorer> Aggregator<P> {
    pub fn new(scorer: SentimentScorer<P>, config: AggregatorConfig) -> Self {
        Self { scorer, config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Scores a collected post and its comments.
    ///
    /// Comments with unusable timestamps are skipped; a post with an unusable
    /// timestamp is rejected as an item failure.
    pub fn score_post(&self, collected: CollectedPost) -> Result<Post, AnalysisError> {
        let CollectedPost { post, comments } = collected;

        let created_utc =
            to_datetime(post.created_utc).ok_or_else(|| AnalysisError::ItemProcessing {
                item: format!("post {}", post.id),
                reason: format!("invalid creation time {}", post.created_utc),
            })?;

        let comments: Vec<Comment> = comments
            .into_iter()
            .filter_map(|raw| match to_datetime(raw.created_utc) {
                Some(created_utc) => Some(Comment {
                    sentiment: self.scorer.score(&raw.body),
                    body: raw.body,
                    score: raw.score,
                    created_utc,
                }),
                None => {
                    warn!(
                        "Skipping comment on post {} with invalid creation time {}",
                        post.id, raw.created_utc
                    );
                    None
                }
            })
            .collect();

        let sentiment = match self.config.mode {
            SentimentMode::PostOnly => self
                .scorer
                .score(&format!("{} {}", post.title, post.body)),
            SentimentMode::Blended => {
                let text = if post.body.trim().is_empty() {
                    &post.title
                } else {
                    &post.body
                };
                let post_sentiment = self.scorer.score(text);
                let total: f64 =
                    post_sentiment + comments.iter().map(|c| c.sentiment).sum::<f64>();
                total / (comments.len() + 1) as f64
            }
        };

        debug!(
            "Scored post {} at {:.4} with {} comments",
            post.id,
            sentiment,
            comments.len()
        );

        Ok(Post {
            title: post.title,
            body: post.body,
            score: post.score,
            created_utc,
            url: post.permalink,
            forum: post.forum,
            comment_count: comments.len(),
            comments,
            sentiment,
        })
    }

    /// Rolls scored posts up into the symbol-level result.
    pub fn summarize(
        &self,
        symbol: &str,
        time_period: TimeFilter,
        posts: Vec<Post>,
    ) -> AggregateResult {
        let scores: Vec<f64> = posts
            .iter()
            .map(|p| p.sentiment)
            .filter(|s| s.is_finite())
            .collect();

        if posts.is_empty() || scores.is_empty() {
            return AggregateResult::failure(
                time_period,
                &AnalysisError::NoResults {
                    symbol: symbol.to_string(),
                },
            );
        }

        let mut distribution = SentimentDistribution::default();
        for post in &posts {
            distribution.record(SentimentCategory::classify(post.sentiment));
        }

        let average_sentiment = mean(&scores).unwrap_or(0.0);

        let (comment_average_sentiment, total_comments_analyzed) =
            if self.config.include_comment_stats {
                let comment_scores: Vec<f64> = posts
                    .iter()
                    .flat_map(|p| p.comments.iter().map(|c| c.sentiment))
                    .collect();
                (mean(&comment_scores), Some(comment_scores.len()))
            } else {
                (None, None)
            };

        let post_count = posts.len();
        let top_posts = top_by_score(posts, MAX_TOP_POSTS);

        info!(
            "Aggregated {} posts for {}: average {:.4}, distribution {:?}",
            post_count, symbol, average_sentiment, distribution
        );

        AggregateResult {
            success: true,
            average_sentiment,
            comment_average_sentiment,
            post_count,
            total_comments_analyzed,
            sentiment_distribution: distribution,
            top_posts,
            time_period,
            error: None,
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Highest engagement first; equal scores keep collection order.
fn top_by_score(mut posts: Vec<Post>, n: usize) -> Vec<Post> {
    posts.sort_by(|a, b| b.score.cmp(&a.score));
    posts.truncate(n);
    posts
}

fn to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    DateTime::from_timestamp(seconds.floor() as i64, 0)
}

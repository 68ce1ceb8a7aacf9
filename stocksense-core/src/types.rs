use crate::error::AnalysisError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Recency window applied to a forum search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFilter {
    Hour,
    Day,
    Week,
    #[default]
    Month,
    Year,
    All,
}

impl TimeFilter {
    pub const ALL: [TimeFilter; 6] = [
        TimeFilter::Hour,
        TimeFilter::Day,
        TimeFilter::Week,
        TimeFilter::Month,
        TimeFilter::Year,
        TimeFilter::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFilter::Hour => "hour",
            TimeFilter::Day => "day",
            TimeFilter::Week => "week",
            TimeFilter::Month => "month",
            TimeFilter::Year => "year",
            TimeFilter::All => "all",
        }
    }

    /// Parses a user supplied window, falling back to `default` for anything unrecognised.
    pub fn parse_or(value: &str, default: TimeFilter) -> TimeFilter {
        value.parse().unwrap_or(default)
    }
}

impl FromStr for TimeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        TimeFilter::ALL
            .into_iter()
            .find(|filter| filter.as_str() == wanted)
            .ok_or_else(|| format!("unknown time filter '{}'", s))
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a post's own sentiment is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentMode {
    /// Polarity of the post title and body only.
    PostOnly,
    /// Mean of the post text polarity and every retained comment's polarity.
    #[default]
    Blended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentCategory {
    Positive,
    Neutral,
    Negative,
}

impl SentimentCategory {
    /// Strict sign comparison: exactly 0.0 is neutral.
    pub fn classify(score: f64) -> Self {
        if score > 0.0 {
            SentimentCategory::Positive
        } else if score < 0.0 {
            SentimentCategory::Negative
        } else {
            SentimentCategory::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentDistribution {
    pub fn record(&mut self, category: SentimentCategory) {
        match category {
            SentimentCategory::Positive => self.positive += 1,
            SentimentCategory::Neutral => self.neutral += 1,
            SentimentCategory::Negative => self.negative += 1,
        }
    }

    pub fn get(&self, category: SentimentCategory) -> usize {
        match category {
            SentimentCategory::Positive => self.positive,
            SentimentCategory::Neutral => self.neutral,
            SentimentCategory::Negative => self.negative,
        }
    }

    pub fn total(&self) -> usize {
        self.positive + self.neutral + self.negative
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "text")]
    pub body: String,
    pub score: i64,
    #[serde(with = "display_timestamp")]
    pub created_utc: DateTime<Utc>,
    pub sentiment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    #[serde(rename = "text")]
    pub body: String,
    pub score: i64,
    #[serde(with = "display_timestamp")]
    pub created_utc: DateTime<Utc>,
    pub url: String,
    #[serde(rename = "subreddit")]
    pub forum: String,
    pub comments: Vec<Comment>,
    pub sentiment: f64,
    pub comment_count: usize,
}

/// Upper bound on `AggregateResult::top_posts`.
pub const MAX_TOP_POSTS: usize = 5;

/// Outcome of one analysis run. Always well formed, even on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub success: bool,
    pub average_sentiment: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_average_sentiment: Option<f64>,
    pub post_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_comments_analyzed: Option<usize>,
    pub sentiment_distribution: SentimentDistribution,
    pub top_posts: Vec<Post>,
    pub time_period: TimeFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AggregateResult {
    /// Zero-valued envelope carrying the failure reason.
    pub fn failure(time_period: TimeFilter, error: &AnalysisError) -> Self {
        Self {
            success: false,
            average_sentiment: 0.0,
            comment_average_sentiment: None,
            post_count: 0,
            total_comments_analyzed: None,
            sentiment_distribution: SentimentDistribution::default(),
            top_posts: Vec::new(),
            time_period,
            error: Some(error.to_string()),
        }
    }
}

pub mod display_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

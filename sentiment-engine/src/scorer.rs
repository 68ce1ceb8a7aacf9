use crate::normalizer::normalize_text;
use stocksense_core::CoreError;
use tracing::debug;
use vader_sentiment::SentimentIntensityAnalyzer;

/// A text → polarity function. Results are expected in [-1.0, 1.0].
pub trait PolarityScorer: Send + Sync {
    fn polarity(&self, text: &str) -> Result<f64, CoreError>;
}

impl<F> PolarityScorer for F
where
    F: Fn(&str) -> Result<f64, CoreError> + Send + Sync,
{
    fn polarity(&self, text: &str) -> Result<f64, CoreError> {
        self(text)
    }
}

/// VADER compound score, tuned for short social-media text.
pub struct VaderPolarity {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl VaderPolarity {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }
}

impl Default for VaderPolarity {
    fn default() -> Self {
        Self::new()
    }
}

impl PolarityScorer for VaderPolarity {
    fn polarity(&self, text: &str) -> Result<f64, CoreError> {
        let scores = self.analyzer.polarity_scores(text);
        scores
            .get("compound")
            .copied()
            .ok_or_else(|| CoreError::Internal {
                message: "VADER returned no compound score".to_string(),
            })
    }
}

/// Normalizes text and scores it, mapping every failure to a neutral 0.0.
pub struct SentimentScorer<P> {
    polarity: P,
}

impl<P: PolarityScorer> SentimentScorer<P> {
    pub fn new(polarity: P) -> Self {
        Self { polarity }
    }

    pub fn score(&self, text: &str) -> f64 {
        let cleaned = normalize_text(text);
        if cleaned.is_empty() {
            return 0.0;
        }

        match self.polarity.polarity(&cleaned) {
            Ok(score) if score.is_finite() => score.clamp(-1.0, 1.0),
            Ok(score) => {
                debug!("Discarding non-finite polarity {} for scored text", score);
                0.0
            }
            Err(e) => {
                debug!("Polarity scorer failed, scoring as neutral: {}", e);
                0.0
            }
        }
    }
}

impl Default for SentimentScorer<VaderPolarity> {
    fn default() -> Self {
        Self::new(VaderPolarity::new())
    }
}

pub mod aggregator;
pub mod normalizer;
pub mod scorer;

pub use aggregator::{Aggregator, AggregatorConfig};
pub use normalizer::{normalize_optional, normalize_text};
pub use scorer::{PolarityScorer, SentimentScorer, VaderPolarity};

//! Price snapshots shown next to the sentiment result.

pub mod types;
pub mod yahoo;

use async_trait::async_trait;
use stocksense_core::CoreError;

pub use types::{PricePoint, StockSnapshot};
pub use yahoo::{MarketDataConfig, YahooFinanceClient};

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> Result<StockSnapshot, CoreError>;
}

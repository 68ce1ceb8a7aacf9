use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub symbol: String,
    pub currency: Option<String>,
    pub current_price: f64,
    pub previous_close: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    pub history: Vec<PricePoint>,
}

impl StockSnapshot {
    pub fn new(
        symbol: String,
        currency: Option<String>,
        current_price: f64,
        previous_close: Option<f64>,
        history: Vec<PricePoint>,
    ) -> Self {
        let change = previous_close.map(|previous| current_price - previous);
        let change_percent = previous_close
            .zip(change)
            .filter(|(previous, _)| *previous != 0.0)
            .map(|(previous, change)| change / previous * 100.0);

        Self {
            symbol,
            currency,
            current_price,
            previous_close,
            change,
            change_percent,
            history,
        }
    }
}

pub mod handlers;
pub mod server;

pub use handlers::{AnalyzeResponse, ApiError, AppState, StockData};
pub use server::ApiServer;

use crate::handlers::{self, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use stocksense_core::CoreError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    #[must_use]
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/analyze", post(handlers::analyze))
            .route("/health", get(handlers::health))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Binds `addr` and serves until the process is stopped.
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound or the server fails.
    pub async fn serve(self, addr: &str) -> Result<(), CoreError> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Web API listening on {}", addr);

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}

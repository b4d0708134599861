//! Application state and HTTP router construction.
//!
//! Used by `main` and by the router tests to build the Axum app.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::Config;
use crate::services::RecordStore;

/// Shared state for HTTP handlers.
///
/// The store is built once at startup and handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn RecordStore>,
}

impl AppState {
    pub fn new(config: Arc<Config>, store: Arc<dyn RecordStore>) -> Self {
        Self { config, store }
    }
}

/// Build the full Axum router: health routes, /airtable, and layers.
pub fn build_app(state: AppState) -> Router<()> {
    Router::new()
        .merge(api::health::router())
        .nest("/airtable", api::router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Bindery image-to-PDF conversion service
//!
//! Accepts a batch of JPEG/PNG uploads, renders each onto its own full-bleed
//! A4 page of a single PDF in the submitted order, returns the document as a
//! download, and cleans up every transient file afterwards.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;

use handlers::{convert_handler, health_handler};
use middleware::{logging_middleware, rate_limit_middleware};

/// Builds the application router. Shared by `main` and the test suite so
/// both exercise the same middleware stack.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes();
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/convert", post(convert_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(axum::middleware::from_fn(logging_middleware))
                .layer(axum::middleware::from_fn(rate_limit_middleware)),
        )
        .with_state(state)
}

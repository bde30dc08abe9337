use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use once_cell::sync::Lazy;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::AppError;

// Global semaphore bounding concurrent conversions
pub static REQUEST_SEMAPHORE: Lazy<Semaphore> = Lazy::new(|| {
    let max_requests = std::env::var("MAX_CONCURRENT_REQUESTS")
        .unwrap_or_else(|_| "100".to_string())
        .parse::<usize>()
        .unwrap_or(100);

    info!(
        max_concurrent_requests = max_requests,
        "Initializing request semaphore"
    );
    Semaphore::new(max_requests)
});

pub async fn rate_limit_middleware(request: Request, next: Next) -> Result<Response, AppError> {
    let path = request.uri().path().to_string();

    // Skip the limiter for health probes
    if path == "/api/health" {
        return Ok(next.run(request).await);
    }

    let _permit = REQUEST_SEMAPHORE.try_acquire().map_err(|_| {
        warn!(
            path = path,
            available_permits = REQUEST_SEMAPHORE.available_permits(),
            "Too many concurrent requests"
        );
        AppError::internal("server is at capacity")
    })?;

    debug!(
        path = path,
        available_permits = REQUEST_SEMAPHORE.available_permits(),
        "Request permit acquired"
    );

    Ok(next.run(request).await)
}

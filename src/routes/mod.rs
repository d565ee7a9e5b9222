mod demo;
mod health;
mod metrics;

use crate::server::SharedState;
use axum::{response::Redirect, routing::get, Router};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/classify") }))
        .route(
            "/classify",
            get(demo::classify_page).post(demo::classify_submit),
        )
        .route("/detect", get(demo::detect_page).post(demo::detect_submit))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
}

mod api;
mod error;
mod types;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::Config;
use crate::engine::EngineHandle;

/// State shared by every request handler.
pub struct AppState {
    pub engine: EngineHandle,
    pub reference_dir: PathBuf,
}

/// Build the HTTP application.
pub fn create_app(state: Arc<AppState>, config: &Config) -> Router {
    Router::new()
        .route("/detect-verify-face", post(api::detect_verify_face))
        .route("/status", get(api::status))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes))
        .with_state(state)
}

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use image::RgbImage;
use serde_json::{json, Value};

use super::error::ApiError;
use super::types::DetectVerifyResponse;
use super::AppState;

/// Detect faces in an uploaded image and match each one against the
/// reference directory.
///
/// Expects a multipart form with a `file` field holding the encoded image.
pub async fn detect_verify_face(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<DetectVerifyResponse>, ApiError> {
    let bytes = read_file_field(multipart).await?;
    let image = decode_upload(bytes).await?;

    tracing::debug!(width = image.width(), height = image.height(), "upload decoded");

    let matches = state.engine.match_image(image).await?;
    Ok(Json(DetectVerifyResponse::from_matches(matches)))
}

/// Daemon health: version plus whether the reference directory exists yet.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "reference_dir": state.reference_dir.display().to_string(),
        "reference_dir_exists": state.reference_dir.is_dir(),
    }))
}

/// Pull the bytes of the first `file` field out of the upload.
async fn read_file_field(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            return Ok(field.bytes().await?.to_vec());
        }
    }
    Err(ApiError::MissingFile)
}

/// Decode the upload off the async runtime; image decoding within the size
/// limit can still take tens of milliseconds.
async fn decode_upload(bytes: Vec<u8>) -> Result<RgbImage, ApiError> {
    let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|err| ApiError::Internal(format!("decode task failed: {err}")))??;
    Ok(decoded.to_rgb8())
}

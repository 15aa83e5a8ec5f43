//! `POST /ocr`: run OCR on a Base64-encoded image.

use std::{io::Write as _, time::Instant};

use axum::{Json, extract::State};
use schemars::JsonSchema;
use tempfile::TempPath;

use super::{ApiError, AppState};
use crate::{
    async_utils::{spawn_blocking_propagating_panics, spawn_propagating_panics},
    data_url::decode_image_payload,
    elements::DetectedTextElement,
    engine::detect_elements,
    prelude::*,
};

/// Suffix used when we can't tell what kind of image we were sent.
const DEFAULT_IMAGE_SUFFIX: &str = ".png";

/// Request body for `POST /ocr`.
#[derive(Debug, Deserialize, JsonSchema, Serialize)]
pub struct OcrRequest {
    /// The image, Base64-encoded. A `data:` URL is also accepted.
    pub image: String,
}

/// Response body for `POST /ocr`.
#[derive(Debug, Deserialize, JsonSchema, Serialize)]
pub struct OcrResponse {
    /// Did OCR succeed?
    pub success: bool,

    /// The text we found, in engine order.
    pub elements: Vec<DetectedTextElement>,

    /// Number of elements.
    pub count: usize,

    /// Wall-clock time spent on this request, in milliseconds, rounded to one
    /// decimal place.
    pub processing_time_ms: f64,
}

impl OcrResponse {
    /// A successful response.
    pub fn new(elements: Vec<DetectedTextElement>, processing_time_ms: f64) -> Self {
        Self {
            success: true,
            count: elements.len(),
            elements,
            processing_time_ms,
        }
    }
}

/// POST /ocr
#[instrument(level = "debug", skip_all)]
pub async fn ocr_handler(
    State(state): State<AppState>,
    Json(request): Json<OcrRequest>,
) -> Result<Json<OcrResponse>, ApiError> {
    let started = Instant::now();

    // Decoding and writing a large image would stall the runtime.
    let image_path = spawn_blocking_propagating_panics(move || {
        let image = decode_image_payload(&request.image).map_err(ApiError::InvalidImage)?;
        debug!("Decoded {} byte image", image.len());
        write_temp_image(&image).map_err(ApiError::Internal)
    })
    .await
    .map_err(ApiError::Internal)??;

    // The temp file moves into the detection task, so it outlives the engine's
    // use of it even if the client hangs up. It is deleted when the task ends.
    let engine = state.engine.acquire().await.map_err(ApiError::Internal)?;
    let elements = spawn_propagating_panics(async move {
        let elements = detect_elements(engine.as_ref(), &image_path).await;
        drop(image_path);
        elements
    })
    .await
    .and_then(|elements| elements)
    .map_err(ApiError::Internal)?;

    let processing_time_ms = elapsed_ms(started);
    info!(
        "OCR found {} elements in {:.1}ms",
        elements.len(),
        processing_time_ms
    );
    Ok(Json(OcrResponse::new(elements, processing_time_ms)))
}

/// Write an image to a uniquely-named temporary file, named with an extension
/// matching its contents.
fn write_temp_image(data: &[u8]) -> Result<TempPath> {
    let suffix = infer::get(data)
        .map(|kind| format!(".{}", kind.extension()))
        .unwrap_or_else(|| DEFAULT_IMAGE_SUFFIX.to_owned());
    let mut file = tempfile::Builder::new()
        .prefix("ocr-")
        .suffix(&suffix)
        .tempfile()
        .context("cannot create temporary image file")?;
    file.write_all(data)
        .context("cannot write temporary image file")?;
    file.flush().context("cannot flush temporary image file")?;
    Ok(file.into_temp_path())
}

/// Smallest time we report, so a finished request never claims to be free.
const MIN_PROCESSING_TIME_MS: f64 = 0.1;

/// Milliseconds since `started`, rounded to one decimal place.
fn elapsed_ms(started: Instant) -> f64 {
    let ms = started.elapsed().as_secs_f64() * 1000.0;
    ((ms * 10.0).round() / 10.0).max(MIN_PROCESSING_TIME_MS)
}

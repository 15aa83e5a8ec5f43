//! HTTP API.
//!
//! - `GET /health` is a liveness check.
//! - `POST /ocr` runs OCR on a Base64-encoded image.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{engine::EngineProvider, prelude::*};

pub mod ocr;

/// Largest request body we accept. Base64 adds a third on top of the image.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The OCR engine, shared by all requests.
    pub engine: Arc<EngineProvider>,
}

/// Build our router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ocr", post(ocr::ocr_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Errors returned by our handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The request's image could not be decoded.
    InvalidImage(anyhow::Error),
    /// Anything else, including OCR failures.
    Internal(anyhow::Error),
}

/// JSON body of an error response.
#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, err) = match self {
            ApiError::InvalidImage(err) => {
                warn!("Rejecting OCR request: {:#}", err);
                (StatusCode::BAD_REQUEST, err)
            }
            ApiError::Internal(err) => {
                error!("OCR request failed: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err)
            }
        };
        let body = ErrorBody {
            success: false,
            error: format!("{:#}", err),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request},
    };
    use tower::util::ServiceExt as _;

    use super::*;
    use crate::engine::test_support::{StubEngine, StubFactory};

    #[tokio::test]
    async fn health_is_healthy() {
        let engine = Arc::new(StubEngine::returning(json!([null])));
        let app = create_router(AppState {
            engine: Arc::new(EngineProvider::new(StubFactory::new(engine))),
        });
        let request = Request::builder()
            .method(Method::GET)
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({"status": "healthy"}));
    }

    #[tokio::test]
    async fn health_does_not_load_engine() {
        let factory = StubFactory::new(Arc::new(StubEngine::failing()));
        let loads = factory.loads.clone();
        let app = create_router(AppState {
            engine: Arc::new(EngineProvider::new(factory)),
        });
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(loads.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn errors_render_as_json() {
        let response =
            ApiError::InvalidImage(anyhow!("image is empty")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert!(!body.success);
        assert_eq!(body.error, "image is empty");

        let response = ApiError::Internal(anyhow!("boom").context("OCR failed"))
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.error, "OCR failed: boom");
    }
}

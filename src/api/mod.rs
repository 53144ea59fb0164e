//! HTTP surface: greeting, health probe and `/predict`.

pub mod validation;

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::schema::ReconcileError;
use crate::service::{PredictError, PredictionService};
use validation::FieldError;

const GREETING: &str = "Hello! Welcome to the Penguins Classification API.";
const INTERNAL_DETAIL: &str = "Internal prediction error";

/// Service handle shared by every request.
pub type SharedService = Arc<PredictionService>;

#[derive(Debug, Serialize)]
struct PredictResponse {
    species: String,
}

/// Error responses. Internal failures never carry their cause to the caller.
#[derive(Debug)]
enum ApiError {
    Validation(Vec<FieldError>),
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(detail) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": INTERNAL_DETAIL })),
            )
                .into_response(),
        }
    }
}

pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .with_state(service)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    service: SharedService,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    tracing::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

async fn root() -> Json<Value> {
    Json(json!({ "message": GREETING }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn predict(State(service): State<SharedService>, body: Bytes) -> Response {
    let record = match validation::parse_record(&body) {
        Ok(record) => record,
        Err(errors) => {
            tracing::info!("Rejected prediction request with {} field error(s)", errors.len());
            return ApiError::Validation(errors).into_response();
        }
    };
    tracing::info!("Prediction request: {record:?}");

    match service.predict(&record) {
        Ok(prediction) => {
            tracing::info!("Prediction result: {}", prediction.species);
            Json(PredictResponse {
                species: prediction.species,
            })
            .into_response()
        }
        Err(PredictError::Rejected(ReconcileError::UnknownColumns(columns))) => {
            tracing::warn!("Refused record with columns unknown to the model: {columns:?}");
            let detail = columns.iter().map(FieldError::unknown_column).collect();
            ApiError::Validation(detail).into_response()
        }
        Err(err) => {
            tracing::error!("Prediction failed: {err}");
            ApiError::Internal.into_response()
        }
    }
}

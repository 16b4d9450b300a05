use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use cardscan_ocr::CardScan;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app::AppState;
use crate::error::ApiError;

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/ocr", post(ocr))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Handler for `GET /ping`
async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

/// Handler for `POST /ocr`: one multipart `file` field holding the card photo.
async fn ocr(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<CardScan>, ApiError> {
    let upload = read_file_field(&mut multipart).await?;
    let pipeline = Arc::clone(&state.pipeline);

    // Decoding, thresholding and OCR are CPU-bound; keep them off the reactor.
    let scan = tokio::task::spawn_blocking(move || pipeline.process_bytes(&upload))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(scan))
}

async fn read_file_field(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            return Ok(field.bytes().await?);
        }
    }
    Err(ApiError::MissingFile)
}

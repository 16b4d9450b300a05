use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cardscan_ocr::ExtractionError;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// The pipeline rejected the card.
    Extraction(ExtractionError),
    /// The form had no `file` part.
    MissingFile,
    /// The multipart body could not be read; carries the status axum chose
    /// (400, or 413 past the body limit).
    BadUpload(StatusCode, String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Extraction(_) | ApiError::MissingFile => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadUpload(status, _) => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::Extraction(e) => e.to_string(),
            ApiError::MissingFile => "No image uploaded: expected a multipart field named 'file'".into(),
            ApiError::BadUpload(_, m) => format!("Malformed upload: {m}"),
            ApiError::Internal(m) => format!("Internal error: {m}"),
        }
    }
}

impl From<ExtractionError> for ApiError {
    fn from(e: ExtractionError) -> Self {
        ApiError::Extraction(e)
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        ApiError::BadUpload(e.status(), e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{}", self.detail());
        }
        (status, Json(ErrorBody { detail: self.detail() })).into_response()
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Per-file and per-batch failures raised by the screening pipeline.
///
/// None of these are retried automatically. The batch orchestrator decides
/// whether a per-file failure aborts the batch or is reported alongside the
/// other files' results.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unsupported file format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Failed to extract text from {filename}: {source}")]
    ExtractionFailed {
        filename: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Scoring provider unavailable: {message}")]
    ScoringUnavailable { message: String, timed_out: bool },

    #[error("Malformed scoring response: {0}")]
    MalformedScoringResponse(String),

    #[error("{0}")]
    BatchConstraintViolation(String),
}

impl PipelineError {
    /// Stable tag used in per-file failure reports.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::UnsupportedFormat { .. } => "UnsupportedFormat",
            PipelineError::ExtractionFailed { .. } => "ExtractionFailed",
            PipelineError::ScoringUnavailable { .. } => "ScoringUnavailable",
            PipelineError::MalformedScoringResponse(_) => "MalformedScoringResponse",
            PipelineError::BatchConstraintViolation(_) => "BatchConstraintViolation",
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        PipelineError::ScoringUnavailable {
            message: message.into(),
            timed_out: false,
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            AppError::Pipeline(err) => match err {
                PipelineError::BatchConstraintViolation(msg) => {
                    (StatusCode::BAD_REQUEST, msg.clone())
                }
                PipelineError::UnsupportedFormat { .. } => (
                    StatusCode::BAD_REQUEST,
                    format!("{err}. Only PDF and DOCX are allowed."),
                ),
                PipelineError::ExtractionFailed { filename, source } => {
                    tracing::warn!("Extraction failed for {filename}: {source:#}");
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        format!("Could not read text from {filename}"),
                    )
                }
                PipelineError::ScoringUnavailable { message, timed_out } => {
                    tracing::error!("Scoring provider error: {message}");
                    let status = if *timed_out {
                        StatusCode::GATEWAY_TIMEOUT
                    } else {
                        StatusCode::BAD_GATEWAY
                    };
                    (status, "Failed to analyze resume".to_string())
                }
                PipelineError::MalformedScoringResponse(msg) => {
                    tracing::error!("Malformed scoring response: {msg}");
                    (
                        StatusCode::BAD_GATEWAY,
                        "Failed to analyze resume".to_string(),
                    )
                }
            },
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(json!({ "error": message }))).into_response()
    }
}

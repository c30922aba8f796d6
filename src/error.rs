use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::extraction::{FieldName, MethodTag};
use crate::page::ElementId;

/// Failures raised by matching, extraction and the page adapter
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("No element found at selection center ({x:.0}, {y:.0})")]
    NoElementAtSelection { x: f64, y: f64 },

    #[error("No card container identified around the selection")]
    NoCardIdentified,

    #[error("Selector generation failed: {0}")]
    SelectorGeneration(String),

    #[error("Extraction method '{method}' failed: {message}")]
    MethodExecution { method: MethodTag, message: String },

    #[error("Card {index} extraction failed: {message}")]
    CardBatchElement { index: usize, message: String },

    #[error("Required field missing: {0}")]
    MissingRequiredField(FieldName),

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Unknown element handle: {0}")]
    UnknownElement(ElementId),

    #[error("Page adapter error: {0}")]
    Adapter(String),

    #[error("Text recognition is not available for this page")]
    OcrUnavailable,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ScrapeError {
    /// Matching-stage failures are reported to callers as a structured result
    pub fn is_selection_failure(&self) -> bool {
        matches!(
            self,
            ScrapeError::NoElementAtSelection { .. } | ScrapeError::NoCardIdentified
        )
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Errors surfaced by the HTTP sidecar
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Browser automation error: {0}")]
    BrowserError(String),

    #[error("Invalid request: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            AppError::BrowserError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Browser Error"),
            AppError::Scrape(ScrapeError::InvalidSelector { .. })
            | AppError::Scrape(ScrapeError::Config(_))
            | AppError::Scrape(ScrapeError::Json(_)) => (StatusCode::BAD_REQUEST, "Bad Request"),
            AppError::Scrape(ScrapeError::Csv(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "Export Error"),
            AppError::Scrape(_) => (StatusCode::UNPROCESSABLE_ENTITY, "Extraction Error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Error"),
        };

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
            detail: self.to_string(),
        });

        (status, body).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

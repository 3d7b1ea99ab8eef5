//! Mapping render failures onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use htmlpdf_common::error::HtmlPdfError;
use thiserror::Error;

/// Error returned from request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Render(#[from] HtmlPdfError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Render(err) = &self;
        if err.is_process_failure() {
            tracing::warn!(error = %err, "Renderer failed");
        } else {
            tracing::error!(error = %err, "Request failed");
        }
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

//! HTTP routes: `POST /create-pdf` and `GET /health`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use htmlpdf_common::config::ServerConfig;
use htmlpdf_core::PdfSource;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::serve::{render_and_serve, DEFAULT_FILENAME};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    source: Arc<dyn PdfSource>,
}

impl AppState {
    pub fn new(source: Arc<dyn PdfSource>) -> Self {
        Self { source }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreatePdfQuery {
    /// Name offered to the client in `Content-Disposition`.
    pub filename: Option<String>,
}

/// Create the service router.
pub fn router(source: Arc<dyn PdfSource>, config: &ServerConfig) -> Router {
    Router::new()
        .route("/create-pdf", post(create_pdf))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(source))
}

/// Render the raw HTML request body and return the PDF.
async fn create_pdf(
    State(state): State<AppState>,
    Query(query): Query<CreatePdfQuery>,
    html: Bytes,
) -> Result<Response, ApiError> {
    let filename = query.filename.as_deref().unwrap_or(DEFAULT_FILENAME);
    tracing::info!(
        source = state.source.name(),
        html_bytes = html.len(),
        filename,
        "Creating pdf"
    );
    Ok(render_and_serve(state.source.as_ref(), filename, html.to_vec()).await?)
}

async fn health() -> &'static str {
    "ok"
}

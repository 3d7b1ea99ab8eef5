//! HTTP front end for htmlpdf.
//!
//! Exposes a single rendering endpoint:
//!
//! ```text
//! POST /create-pdf[?filename=name.pdf]   body: raw html
//!   200 application/pdf (attachment)
//!   500 text/plain error message
//! GET  /health                           "ok"
//! ```
//!
//! Any [`PdfSource`] can back the service, so a server can render locally
//! with Chrome or forward to another instance.

pub mod error;
pub mod routes;
pub mod serve;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use htmlpdf_common::config::ServerConfig;
use htmlpdf_common::error::{HtmlPdfError, HtmlPdfResult};
use htmlpdf_core::PdfSource;
use tokio::net::TcpListener;
use tokio::signal;

pub use error::ApiError;
pub use routes::{router, AppState};
pub use serve::{content_disposition, render_and_serve, serve_pdf, DEFAULT_FILENAME, PDF_CONTENT_TYPE};

/// Bind `0.0.0.0:<port>` and serve until Ctrl+C or SIGTERM.
pub async fn run(config: &ServerConfig, source: Arc<dyn PdfSource>) -> HtmlPdfResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| HtmlPdfError::serve(format!("failed to bind {addr}: {e}")))?;
    tracing::info!(source = source.name(), "Rendering with source");
    serve_until(listener, router(source, config), shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
/// In-flight requests are allowed to finish.
pub async fn serve_until<F>(listener: TcpListener, app: Router, shutdown: F) -> HtmlPdfResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local = listener.local_addr()?;
    tracing::info!(addr = %local, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| HtmlPdfError::serve(e.to_string()))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}

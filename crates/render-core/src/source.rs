//! Anything that can turn HTML into a PDF byte stream.
//!
//! The local [`Renderer`] and the HTTP client in `htmlpdf-client` both
//! implement [`PdfSource`], so callers can switch between rendering
//! in-process and delegating to a remote service.

use async_trait::async_trait;
use htmlpdf_common::error::{HtmlPdfError, HtmlPdfResult, TempFileStage};
use tokio::io::AsyncRead;

use crate::pipeline::Renderer;

/// Readable PDF document. Temp files behind it are released on drop.
pub type PdfStream = Box<dyn AsyncRead + Send + Unpin>;

/// Trait for PDF producers (local renderer, remote service).
#[async_trait]
pub trait PdfSource: Send + Sync {
    /// Render `html` and return the finished document.
    async fn create_pdf(&self, html: Vec<u8>) -> HtmlPdfResult<PdfStream>;

    /// Source name for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl PdfSource for Renderer {
    async fn create_pdf(&self, html: Vec<u8>) -> HtmlPdfResult<PdfStream> {
        let pdf = self.create(&html).await?;
        let reader = pdf
            .into_reader()
            .await
            .map_err(|e| HtmlPdfError::temp_file(TempFileStage::OpenOutput, e))?;
        Ok(Box::new(reader))
    }

    fn name(&self) -> &str {
        "chrome"
    }
}

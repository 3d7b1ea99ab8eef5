//! Turning a rendered PDF into an HTTP download.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use htmlpdf_common::error::{HtmlPdfError, HtmlPdfResult};
use htmlpdf_core::PdfSource;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const DEFAULT_FILENAME: &str = "document.pdf";

/// Build a download response that streams `pdf` to the client.
///
/// Sets `Content-Type: application/pdf` and
/// `Content-Disposition: attachment; filename=<filename>`. The document is
/// never held in memory as a whole; a read failure part way through aborts
/// the response body, so the client sees a failed transfer rather than a
/// truncated pdf.
pub fn serve_pdf<R>(filename: &str, pdf: R) -> HtmlPdfResult<Response>
where
    R: AsyncRead + Send + 'static,
{
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, PDF_CONTENT_TYPE)
        .header(header::CONTENT_DISPOSITION, content_disposition(filename))
        .body(Body::from_stream(ReaderStream::new(pdf)))
        .map_err(|e| HtmlPdfError::serve(e.to_string()))
}

/// Render `html` with `source` and serve the result as `filename`.
pub async fn render_and_serve(
    source: &dyn PdfSource,
    filename: &str,
    html: Vec<u8>,
) -> HtmlPdfResult<Response> {
    let pdf = source.create_pdf(html).await?;
    serve_pdf(filename, pdf)
}

/// `attachment; filename=<name>` with anything outside a conservative
/// character set replaced, so the header is always valid.
pub fn content_disposition(filename: &str) -> String {
    let name: String = filename
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let name = if name.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        name
    };
    format!("attachment; filename={name}")
}

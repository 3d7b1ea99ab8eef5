//! Client for a remote htmlpdf service.
//!
//! [`RemoteClient`] posts html to `<service>/create-pdf` and hands back the
//! PDF. It implements [`PdfSource`], so anything that renders through a
//! local [`Renderer`](htmlpdf_core::Renderer) can render remotely instead.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use htmlpdf_common::config::ClientConfig;
use htmlpdf_common::error::{HtmlPdfError, HtmlPdfResult};
use htmlpdf_core::{PdfSource, PdfStream};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

pub const CREATE_PDF_PATH: &str = "/create-pdf";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Clone, Debug)]
pub struct RemoteClient {
    client: Client,
    service_url: String,
}

impl RemoteClient {
    /// Client for the service at `service_url` with the default ten minute
    /// request timeout.
    pub fn new(service_url: impl Into<String>) -> HtmlPdfResult<Self> {
        Self::with_timeout(service_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(service_url: impl Into<String>, timeout: Duration) -> HtmlPdfResult<Self> {
        let service_url = service_url.into();
        if service_url.trim().is_empty() {
            return Err(HtmlPdfError::config("pdf service url is not set"));
        }

        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|e| HtmlPdfError::remote(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            service_url: service_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> HtmlPdfResult<Self> {
        Self::with_timeout(config.service_url.clone(), config.timeout())
    }

    pub fn user_agent() -> &'static str {
        concat!("htmlpdf-client/", env!("CARGO_PKG_VERSION"))
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    fn endpoint(&self) -> String {
        format!("{}{CREATE_PDF_PATH}", self.service_url)
    }

    /// Render `html` remotely and return the whole PDF.
    pub async fn create_pdf_bytes(&self, html: Vec<u8>) -> HtmlPdfResult<Bytes> {
        let url = self.endpoint();
        tracing::debug!(url = %url, html_bytes = html.len(), "Requesting remote render");

        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "text/html")
            .body(html)
            .send()
            .await
            .map_err(|e| HtmlPdfError::remote(format!("request to {url} failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| HtmlPdfError::remote(format!("failed to read response from {url}: {e}")))?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            return Err(HtmlPdfError::remote(format!(
                "status {status} body {}",
                text.trim()
            )));
        }

        tracing::debug!(pdf_bytes = body.len(), "Remote render finished");
        Ok(body)
    }
}

#[async_trait]
impl PdfSource for RemoteClient {
    async fn create_pdf(&self, html: Vec<u8>) -> HtmlPdfResult<PdfStream> {
        let pdf = self.create_pdf_bytes(html).await?;
        Ok(Box::new(Cursor::new(pdf)))
    }

    fn name(&self) -> &str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;
    use tokio::io::AsyncReadExt;

    fn client(server: &MockServer) -> RemoteClient {
        RemoteClient::new(server.base_url()).expect("client")
    }

    #[tokio::test]
    async fn posts_html_and_returns_pdf() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("POST")
                .path("/create-pdf")
                .header("content-type", "text/html")
                .body("<h1>Hello, World!</h1>");
            then.status(200)
                .header("content-type", "application/pdf")
                .body("%PDF-1.4 remote");
        });

        let pdf = client(&server)
            .create_pdf_bytes(b"<h1>Hello, World!</h1>".to_vec())
            .await
            .expect("pdf");

        mock.assert();
        assert_eq!(&pdf[..], b"%PDF-1.4 remote");
    }

    #[tokio::test]
    async fn server_errors_carry_status_and_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("POST").path("/create-pdf");
            then.status(500).body("Renderer exited with status 1: Error: invalid input");
        });

        let err = client(&server).create_pdf_bytes(Vec::new()).await.unwrap_err();
        assert!(matches!(err, HtmlPdfError::Remote { .. }));
        let text = err.to_string();
        assert!(text.contains("500"), "{text}");
        assert!(text.contains("Error: invalid input"), "{text}");
    }

    #[tokio::test]
    async fn acts_as_pdf_source() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("POST").path("/create-pdf");
            then.status(200).body("%PDF-1.4 streamed");
        });

        let source: &dyn PdfSource = &client(&server);
        let mut stream = source.create_pdf(b"<p>x</p>".to_vec()).await.expect("stream");
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await.unwrap();

        assert_eq!(bytes, b"%PDF-1.4 streamed");
        assert_eq!(source.name(), "remote");
    }

    #[tokio::test]
    async fn unreachable_service_is_a_remote_error() {
        let remote = RemoteClient::with_timeout("http://127.0.0.1:9", Duration::from_secs(5)).unwrap();
        let err = remote.create_pdf_bytes(b"<p>x</p>".to_vec()).await.unwrap_err();
        assert!(matches!(err, HtmlPdfError::Remote { .. }), "{err:?}");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let remote = RemoteClient::new("http://pdf.internal:8080/").unwrap();
        assert_eq!(remote.service_url(), "http://pdf.internal:8080");
        assert_eq!(remote.endpoint(), "http://pdf.internal:8080/create-pdf");
    }

    #[test]
    fn empty_service_url_is_a_config_error() {
        let err = RemoteClient::from_config(&ClientConfig::default()).unwrap_err();
        assert!(matches!(err, HtmlPdfError::Config { .. }));
    }
}

//! Render a single html document.

use std::path::{Path, PathBuf};

use htmlpdf_client::RemoteClient;
use htmlpdf_common::config::AppConfig;
use htmlpdf_core::{PdfSource, Renderer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const STDIO: &str = "-";

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == STDIO
}

/// Local Chrome, unless a service url is configured.
pub fn select_source(config: &AppConfig) -> anyhow::Result<Box<dyn PdfSource>> {
    if config.client.service_url.trim().is_empty() {
        Ok(Box::new(Renderer::new(config.renderer.clone())))
    } else {
        Ok(Box::new(RemoteClient::from_config(&config.client)?))
    }
}

async fn read_input(input: &Path) -> anyhow::Result<Vec<u8>> {
    if is_stdio(input) {
        let mut html = Vec::new();
        tokio::io::stdin().read_to_end(&mut html).await?;
        Ok(html)
    } else {
        tokio::fs::read(input)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", input.display()))
    }
}

pub async fn run(config: AppConfig, input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let html = read_input(&input).await?;
    let source = select_source(&config)?;
    tracing::info!(source = source.name(), html_bytes = html.len(), "Rendering");

    let mut pdf = source.create_pdf(html).await?;

    let written = if is_stdio(&output) {
        let mut stdout = tokio::io::stdout();
        let written = tokio::io::copy(&mut pdf, &mut stdout).await?;
        stdout.flush().await?;
        written
    } else {
        let mut file = tokio::fs::File::create(&output)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", output.display()))?;
        let written = tokio::io::copy(&mut pdf, &mut file).await?;
        file.sync_all().await?;
        eprintln!("Wrote {} ({written} bytes)", output.display());
        written
    };

    tracing::debug!(pdf_bytes = written, "Render complete");
    Ok(())
}

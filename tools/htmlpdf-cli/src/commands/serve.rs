//! Run the HTTP render service.

use std::sync::Arc;

use htmlpdf_common::config::AppConfig;
use htmlpdf_core::{PdfSource, Renderer};

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let renderer = Renderer::new(config.renderer);
    if !renderer.is_available() {
        tracing::warn!(
            chrome = %renderer.config().chrome_path.display(),
            "Chrome executable not found; renders will fail until it is installed"
        );
    }

    let source: Arc<dyn PdfSource> = Arc::new(renderer);
    htmlpdf_server::run(&config.server, source).await?;
    Ok(())
}

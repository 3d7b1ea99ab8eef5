//! Check that the configured Chrome can be run.

use htmlpdf_common::config::AppConfig;
use htmlpdf_core::pipeline::resolve_executable;
use htmlpdf_core::Renderer;

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    println!("htmlpdf System Check");
    println!("{}", "=".repeat(50));

    let chrome = config.renderer.chrome_path.clone();
    let Some(resolved) = resolve_executable(&chrome) else {
        println!("[FAIL] Chrome executable: {} (not found)", chrome.display());
        println!();
        println!("Install Chrome or pass --chrome-path.");
        anyhow::bail!("Chrome executable {} not found", chrome.display());
    };
    println!("[OK] Chrome executable: {}", resolved.display());

    let renderer = Renderer::new(config.renderer);
    match renderer.version().await {
        Ok(version) => println!("[OK] Version: {version}"),
        Err(e) => {
            println!("[FAIL] Version check: {e}");
            anyhow::bail!("Chrome did not report a version");
        }
    }

    if config.client.service_url.trim().is_empty() {
        println!("[OK] Remote service: not configured (rendering locally)");
    } else {
        println!("[OK] Remote service: {}", config.client.service_url);
    }

    println!();
    println!("Chrome is ready. htmlpdf can render.");
    Ok(())
}

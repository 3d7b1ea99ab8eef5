//! htmlpdf CLI: run the render service or render a single document.
//!
//! Usage:
//!   htmlpdf serve [--port N]              Run the HTTP render service
//!   htmlpdf render <INPUT|-> -o <OUT|->   Render one html document
//!   htmlpdf check                         Check that Chrome is usable

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use htmlpdf_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "htmlpdf",
    about = "Render html to pdf with headless Chrome",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/htmlpdf/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP render service
    Serve {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Chrome executable
        #[arg(long)]
        chrome_path: Option<PathBuf>,
    },

    /// Render one html document to pdf
    Render {
        /// Html file, or `-` for stdin
        input: PathBuf,

        /// Pdf destination, or `-` for stdout
        #[arg(short, long)]
        output: PathBuf,

        /// Chrome executable
        #[arg(long)]
        chrome_path: Option<PathBuf>,

        /// Render through a remote htmlpdf service instead of local Chrome
        #[arg(long)]
        service_url: Option<String>,
    },

    /// Check that the configured Chrome can be run
    Check {
        /// Chrome executable
        #[arg(long)]
        chrome_path: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display())),
        None => Ok(AppConfig::load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    htmlpdf_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Serve { port, chrome_path } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(chrome_path) = chrome_path {
                config.renderer.chrome_path = chrome_path;
            }
            commands::serve::run(config).await
        }
        Commands::Render {
            input,
            output,
            chrome_path,
            service_url,
        } => {
            if let Some(chrome_path) = chrome_path {
                config.renderer.chrome_path = chrome_path;
            }
            if let Some(service_url) = service_url {
                config.client.service_url = service_url;
            }
            commands::render::run(config, input, output).await
        }
        Commands::Check { chrome_path } => {
            if let Some(chrome_path) = chrome_path {
                config.renderer.chrome_path = chrome_path;
            }
            commands::check::run(config).await
        }
    }
}

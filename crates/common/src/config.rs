//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{HtmlPdfError, HtmlPdfResult};

/// Fixed flags passed to the renderer ahead of the job-specific arguments.
pub const DEFAULT_RENDERER_ARGS: [&str; 10] = [
    "--headless",
    "--no-sandbox",
    "--disable-background-networking",
    "--disable-extensions",
    "--safebrowsing-disable-auto-update",
    "--disable-sync",
    "--disable-gpu",
    "--disable-default-apps",
    "--no-first-run",
    "--hide-scrollbars",
];

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Renderer invocation and supervision settings.
    pub renderer: RendererConfig,

    /// HTTP service settings.
    pub server: ServerConfig,

    /// Remote client settings.
    pub client: ClientConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// How to launch and watch the external renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Path or command name of the Chrome/Chromium executable.
    pub chrome_path: PathBuf,

    /// Base arguments, before `--print-to-pdf` and the input URI.
    pub args: Vec<String>,

    /// Interval between stream drain attempts (ms).
    pub poll_interval_ms: u64,

    /// Upper bound on bytes taken from a stream per read.
    pub read_chunk_bytes: usize,

    /// Case-insensitive marker that flags renderer output as a failure.
    /// An empty pattern disables output-based detection.
    pub failure_pattern: String,

    /// How long to keep draining streams after the renderer exits (ms).
    pub drain_grace_ms: u64,

    /// Directory for job temp files. Uses the system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

/// HTTP service parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port the service binds to on all interfaces.
    pub port: u16,

    /// Largest accepted HTML request body.
    pub max_body_bytes: usize,
}

/// Remote rendering service parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of a running htmlpdf service, e.g. `http://pdf:8080`.
    pub service_url: String,

    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "htmlpdf_core=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            chrome_path: PathBuf::from("google-chrome"),
            args: DEFAULT_RENDERER_ARGS.iter().map(|a| a.to_string()).collect(),
            poll_interval_ms: 5,
            read_chunk_bytes: 1000,
            failure_pattern: "error".to_string(),
            drain_grace_ms: 500,
            temp_dir: None,
        }
    }
}

impl RendererConfig {
    /// Default settings with a different executable.
    pub fn with_chrome_path(chrome_path: impl Into<PathBuf>) -> Self {
        Self {
            chrome_path: chrome_path.into(),
            ..Self::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 80,
            max_body_bytes: 64 * 1024 * 1024,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_url: String::new(),
            timeout_secs: 600,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Missing or malformed files are errors.
    pub fn load_from(path: &Path) -> HtmlPdfResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HtmlPdfError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("htmlpdf").join("config.json")
}

//! Error types shared across htmlpdf crates.

use std::fmt;
use std::path::PathBuf;

/// Which output stream of the renderer process an error relates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Temp-file handling phase that failed while preparing or finishing a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempFileStage {
    CreateInput,
    WriteInput,
    CloseInput,
    CreateOutput,
    OpenOutput,
}

impl fmt::Display for TempFileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::CreateInput => "creating html temp file",
            Self::WriteInput => "writing html contents to temp file",
            Self::CloseInput => "closing html temp file",
            Self::CreateOutput => "creating pdf temp file",
            Self::OpenOutput => "opening rendered pdf",
        };
        f.write_str(stage)
    }
}

/// Top-level error type for htmlpdf operations.
#[derive(Debug, thiserror::Error)]
pub enum HtmlPdfError {
    #[error("Temp file error while {stage}: {source}")]
    TempFile {
        stage: TempFileStage,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start renderer {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed reading renderer {stream}: {source}")]
    StreamRead {
        stream: OutputStream,
        #[source]
        source: std::io::Error,
    },

    #[error("Renderer failure detected on {stream} ({reason}): {output}")]
    FailureDetected {
        stream: OutputStream,
        reason: String,
        output: String,
    },

    #[error("Failed waiting for renderer: {source}")]
    Wait {
        #[source]
        source: std::io::Error,
    },

    #[error("Renderer exited with {}: {output}", exit_label(.code))]
    Exit { code: Option<i32>, output: String },

    #[error("Renderer produced an empty document at {}", .path.display())]
    EmptyOutput { path: PathBuf },

    #[error("Remote render error: {message}")]
    Remote { message: String },

    #[error("Serve error: {message}")]
    Serve { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using HtmlPdfError.
pub type HtmlPdfResult<T> = Result<T, HtmlPdfError>;

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl HtmlPdfError {
    pub fn temp_file(stage: TempFileStage, source: std::io::Error) -> Self {
        Self::TempFile { stage, source }
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote {
            message: msg.into(),
        }
    }

    pub fn serve(msg: impl Into<String>) -> Self {
        Self::Serve {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// True when the renderer process itself failed, as opposed to setup or
    /// transport problems around it.
    pub fn is_process_failure(&self) -> bool {
        matches!(
            self,
            Self::Exit { .. }
                | Self::FailureDetected { .. }
                | Self::StreamRead { .. }
                | Self::Wait { .. }
        )
    }

    /// True when the error was raised by the output classifier.
    pub fn is_detected_failure(&self) -> bool {
        matches!(self, Self::FailureDetected { .. })
    }
}

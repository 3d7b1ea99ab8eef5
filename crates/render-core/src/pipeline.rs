//! Render pipeline: temp-file handoff around one supervised renderer run.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use htmlpdf_common::config::RendererConfig;
use htmlpdf_common::error::{HtmlPdfError, HtmlPdfResult, TempFileStage};
use tempfile::{NamedTempFile, TempPath};
use tokio::io::{AsyncRead, ReadBuf};

use crate::classifier::FailureClassifier;
use crate::supervisor::{Invocation, ProcessSupervisor};

const INPUT_PREFIX: &str = "htmlToPdf";
const OUTPUT_PREFIX: &str = "tempPDF";
const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// One end-to-end render: the input and output temp files plus the
/// renderer invocation that connects them.
///
/// Dropping the job removes both files.
#[derive(Debug)]
pub struct RenderJob {
    input: TempPath,
    output: TempPath,
    invocation: Invocation,
}

impl RenderJob {
    /// Write `html` to a fresh input file and reserve the output path.
    pub fn prepare(config: &RendererConfig, html: &[u8]) -> HtmlPdfResult<Self> {
        let mut input = temp_file(config, INPUT_PREFIX, ".html")
            .map_err(|e| HtmlPdfError::temp_file(TempFileStage::CreateInput, e))?;
        input
            .write_all(html)
            .and_then(|()| input.flush())
            .map_err(|e| HtmlPdfError::temp_file(TempFileStage::WriteInput, e))?;
        input
            .as_file()
            .sync_all()
            .map_err(|e| HtmlPdfError::temp_file(TempFileStage::CloseInput, e))?;
        let input = input.into_temp_path();

        // Only the path is reserved here; the renderer writes the contents.
        let output = temp_file(config, OUTPUT_PREFIX, ".pdf")
            .map_err(|e| HtmlPdfError::temp_file(TempFileStage::CreateOutput, e))?
            .into_temp_path();

        let invocation = Invocation::new(&config.chrome_path)
            .args(config.args.iter())
            .arg(print_to_pdf_flag(&output))
            .arg(file_uri(&input));

        Ok(Self {
            input,
            output,
            invocation,
        })
    }

    pub fn input_path(&self) -> &Path {
        &self.input
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    /// Hand the output file over to the caller and remove the input file.
    ///
    /// Fails, removing both files, if the renderer left the output empty.
    pub fn finish(self) -> HtmlPdfResult<RenderedPdf> {
        let len = std::fs::metadata(&self.output)
            .map_err(|e| HtmlPdfError::temp_file(TempFileStage::OpenOutput, e))?
            .len();
        if len == 0 {
            return Err(HtmlPdfError::EmptyOutput {
                path: self.output.to_path_buf(),
            });
        }

        let Self { input, output, .. } = self;
        let input_path = input.to_path_buf();
        if let Err(err) = input.close() {
            tracing::warn!(path = %input_path.display(), error = %err, "Failed to remove html temp file");
        }
        Ok(RenderedPdf { path: output, len })
    }
}

fn temp_file(config: &RendererConfig, prefix: &str, suffix: &str) -> io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix).suffix(suffix);
    match &config.temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
}

fn print_to_pdf_flag(output: &Path) -> OsString {
    let mut flag = OsString::from("--print-to-pdf=");
    flag.push(output.as_os_str());
    flag
}

fn file_uri(input: &Path) -> OsString {
    let mut uri = OsString::from("file://");
    uri.push(input.as_os_str());
    uri
}

/// A successfully rendered PDF on disk.
///
/// The file is deleted when this value is dropped, unless it was moved out
/// with [`RenderedPdf::persist`] or [`RenderedPdf::keep`].
#[derive(Debug)]
pub struct RenderedPdf {
    path: TempPath,
    len: u64,
}

impl RenderedPdf {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Open the document for blocking reads.
    pub fn open(&self) -> io::Result<std::fs::File> {
        std::fs::File::open(&self.path)
    }

    pub async fn read_all(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&*self.path).await
    }

    /// Async reader that deletes the file once it is dropped.
    pub async fn into_reader(self) -> io::Result<PdfFile> {
        let file = tokio::fs::File::open(&*self.path).await?;
        Ok(PdfFile {
            file,
            _path: self.path,
        })
    }

    /// Move the document to `dest`, copying when a rename is not possible.
    pub fn persist(self, dest: impl AsRef<Path>) -> io::Result<()> {
        let dest = dest.as_ref();
        match self.path.persist(dest) {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::debug!(error = %err.error, dest = %dest.display(), "Rename failed; copying pdf");
                std::fs::copy(&err.path, dest).map(|_| ())
            }
        }
    }

    /// Stop managing the file and return its path; the caller deletes it.
    pub fn keep(self) -> io::Result<PathBuf> {
        self.path.keep().map_err(|err| err.error)
    }
}

/// Open rendered PDF that removes itself from disk when dropped.
#[derive(Debug)]
pub struct PdfFile {
    file: tokio::fs::File,
    _path: TempPath,
}

impl AsyncRead for PdfFile {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}

/// A configured HTML to PDF renderer.
///
/// Cheap to clone; clones share configuration. Independent instances with
/// different executables or flags can run side by side, and concurrent
/// calls on one instance never share files or processes.
#[derive(Debug, Clone)]
pub struct Renderer {
    config: Arc<RendererConfig>,
    supervisor: ProcessSupervisor,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        let supervisor = ProcessSupervisor::from_config(&config);
        Self {
            config: Arc::new(config),
            supervisor,
        }
    }

    /// Default flags with a different Chrome executable.
    pub fn with_chrome_path(chrome_path: impl Into<PathBuf>) -> Self {
        Self::new(RendererConfig::with_chrome_path(chrome_path))
    }

    /// Replace the output classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.supervisor = self.supervisor.with_classifier(classifier);
        self
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Render `html` to a PDF.
    ///
    /// The input temp file is gone when this returns, whatever the outcome.
    /// On failure no output file is left behind either.
    pub async fn create(&self, html: &[u8]) -> HtmlPdfResult<RenderedPdf> {
        let started = Instant::now();
        let job = RenderJob::prepare(&self.config, html)?;
        tracing::debug!(
            input = %job.input_path().display(),
            output = %job.output_path().display(),
            html_bytes = html.len(),
            "Render job prepared"
        );

        let run = match self.supervisor.run(job.invocation()).await {
            Ok(run) => run,
            Err(err) => {
                tracing::warn!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %err,
                    "Render failed"
                );
                return Err(err);
            }
        };

        let pdf = job.finish()?;
        tracing::info!(
            pid = run.pid,
            pdf_bytes = pdf.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rendered pdf"
        );
        Ok(pdf)
    }

    /// Whether the configured executable exists, either as a path or on `PATH`.
    pub fn is_available(&self) -> bool {
        resolve_executable(&self.config.chrome_path).is_some()
    }

    /// Output of `<chrome> --version`.
    pub async fn version(&self) -> HtmlPdfResult<String> {
        let program = &self.config.chrome_path;
        let probe = tokio::process::Command::new(program)
            .arg("--version")
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(VERSION_PROBE_TIMEOUT, probe)
            .await
            .map_err(|_| HtmlPdfError::Wait {
                source: io::Error::new(io::ErrorKind::TimedOut, "version probe timed out"),
            })?
            .map_err(|source| HtmlPdfError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(HtmlPdfError::Exit {
                code: output.status.code(),
                output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Locate an executable given as a path or a bare command name.
pub fn resolve_executable(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }
    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

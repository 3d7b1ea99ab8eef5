//! Process supervision for one renderer invocation.
//!
//! The supervisor spawns the renderer and attaches a [`StreamWatchdog`] to
//! each output pipe. It then waits on whichever comes first: process exit
//! or a watchdog failure signal. A failure signal kills the child
//! immediately, so a renderer that hangs after printing an error cannot
//! block the caller.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use htmlpdf_common::config::RendererConfig;
use htmlpdf_common::error::{HtmlPdfError, HtmlPdfResult, OutputStream};
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::classifier::{FailureClassifier, NeverFail, SubstringClassifier};
use crate::watchdog::{StreamWatchdog, WatchdogSignal, WatchdogState, OUTPUT_TAIL_BYTES};

/// Executable plus its complete argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Space-joined command line for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a renderer run that exited cleanly with no flagged output.
#[derive(Debug, Clone)]
pub struct SupervisedRun {
    pub pid: Option<u32>,
    pub elapsed: Duration,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Both watchdog states of one run.
struct StreamStates {
    stdout: Arc<WatchdogState>,
    stderr: Arc<WatchdogState>,
}

impl StreamStates {
    fn get(&self, stream: OutputStream) -> &WatchdogState {
        match stream {
            OutputStream::Stdout => &self.stdout,
            OutputStream::Stderr => &self.stderr,
        }
    }

    /// Output to attach to an exit error: stderr, or stdout if stderr is silent.
    fn exit_output(&self) -> String {
        let stderr = self.stderr.output_tail(OUTPUT_TAIL_BYTES);
        if stderr.is_empty() {
            self.stdout.output_tail(OUTPUT_TAIL_BYTES)
        } else {
            stderr
        }
    }
}

/// Runs renderer processes under watchdog supervision.
#[derive(Clone)]
pub struct ProcessSupervisor {
    classifier: Arc<dyn FailureClassifier>,
    poll_interval: Duration,
    chunk_size: usize,
    drain_grace: Duration,
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("classifier", &self.classifier.name())
            .field("poll_interval", &self.poll_interval)
            .field("chunk_size", &self.chunk_size)
            .field("drain_grace", &self.drain_grace)
            .finish()
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::from_config(&RendererConfig::default())
    }
}

impl ProcessSupervisor {
    pub fn new(classifier: Arc<dyn FailureClassifier>) -> Self {
        Self {
            classifier,
            ..Self::default()
        }
    }

    /// Supervisor with the polling and classifier settings of `config`.
    pub fn from_config(config: &RendererConfig) -> Self {
        let classifier: Arc<dyn FailureClassifier> = if config.failure_pattern.is_empty() {
            Arc::new(NeverFail)
        } else {
            Arc::new(SubstringClassifier::new(config.failure_pattern.clone()))
        };
        Self {
            classifier,
            poll_interval: config.poll_interval(),
            chunk_size: config.read_chunk_bytes.max(1),
            drain_grace: config.drain_grace(),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_drain_grace(mut self, drain_grace: Duration) -> Self {
        self.drain_grace = drain_grace;
        self
    }

    fn watchdog(&self, stream: OutputStream) -> StreamWatchdog {
        StreamWatchdog::new(
            stream,
            Arc::clone(&self.classifier),
            self.poll_interval,
            self.chunk_size,
        )
    }

    /// Run `invocation` to completion.
    ///
    /// Succeeds only if the process exits with status 0 and neither stream
    /// was flagged. The child is never left running when this returns, and
    /// dropping the returned future kills it and stops both watchdogs.
    pub async fn run(&self, invocation: &Invocation) -> HtmlPdfResult<SupervisedRun> {
        tracing::debug!(command = %invocation.command_line(), "Starting renderer");

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| HtmlPdfError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        tracing::info!(
            pid = child.id(),
            program = %invocation.program.display(),
            args_len = invocation.args.len(),
            "Renderer process started"
        );

        let stdout = child.stdout.take().ok_or_else(|| HtmlPdfError::StreamRead {
            stream: OutputStream::Stdout,
            source: std::io::Error::other("stdout was not captured"),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| HtmlPdfError::StreamRead {
            stream: OutputStream::Stderr,
            source: std::io::Error::other("stderr was not captured"),
        })?;

        self.supervise(&mut child, stdout, stderr).await
    }

    /// Watch a running `child` through its two output readers until it
    /// exits or a watchdog reports a failure, in which case it is killed.
    async fn supervise<O, E>(
        &self,
        child: &mut Child,
        stdout: O,
        stderr: E,
    ) -> HtmlPdfResult<SupervisedRun>
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let started = Instant::now();
        let pid = child.id();

        let stdout_watchdog = self.watchdog(OutputStream::Stdout);
        let stderr_watchdog = self.watchdog(OutputStream::Stderr);
        let states = StreamStates {
            stdout: stdout_watchdog.state(),
            stderr: stderr_watchdog.state(),
        };

        // Dropping the set aborts both watchdogs, on every exit path
        // including cancellation of this future.
        let mut watchdogs = JoinSet::new();
        let (signals_tx, mut signals) = mpsc::channel::<WatchdogSignal>(2);
        stdout_watchdog.spawn_in(&mut watchdogs, stdout, signals_tx.clone());
        stderr_watchdog.spawn_in(&mut watchdogs, stderr, signals_tx);

        let waited = loop {
            tokio::select! {
                waited = child.wait() => break waited,
                Some(signal) = signals.recv() => {
                    let state = states.get(signal.stream);
                    if let Some(err) = signal.into_error(state) {
                        request_kill(child, pid);
                        if let Err(wait_err) = child.wait().await {
                            tracing::warn!(pid, error = %wait_err, "Failed to reap killed renderer");
                        }
                        watchdogs.abort_all();
                        tracing::warn!(
                            pid,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            error = %err,
                            "Renderer terminated after watchdog signal"
                        );
                        return Err(err);
                    }
                }
            }
        };

        let status = match waited {
            Ok(status) => status,
            Err(source) => {
                request_kill(child, pid);
                return Err(HtmlPdfError::Wait { source });
            }
        };

        // Helper processes can inherit the pipes and keep them open after the
        // main process is gone, so draining is bounded by the grace period.
        let mut late_failure = None;
        let collect = async {
            while let Some(signal) = signals.recv().await {
                if signal.outcome.is_failure() && late_failure.is_none() {
                    late_failure = Some(signal);
                }
            }
        };
        if tokio::time::timeout(self.drain_grace, collect).await.is_err() {
            tracing::warn!(
                pid,
                grace_ms = self.drain_grace.as_millis() as u64,
                "Renderer streams still open after exit; abandoning watchdogs"
            );
        }
        watchdogs.abort_all();

        if let Some(signal) = late_failure {
            let state = states.get(signal.stream);
            if let Some(err) = signal.into_error(state) {
                return Err(err);
            }
        }

        if !status.success() {
            let err = HtmlPdfError::Exit {
                code: status.code(),
                output: states.exit_output(),
            };
            tracing::warn!(pid, error = %err, "Renderer exited unsuccessfully");
            return Err(err);
        }

        let elapsed = started.elapsed();
        tracing::debug!(
            pid,
            elapsed_ms = elapsed.as_millis() as u64,
            stdout_bytes = states.stdout.output_len(),
            stderr_bytes = states.stderr.output_len(),
            "Renderer exited cleanly"
        );

        Ok(SupervisedRun {
            pid,
            elapsed,
            stdout: states.stdout.output(),
            stderr: states.stderr.output(),
        })
    }
}

/// Ask the OS to kill `child`. An already-exited child is not an error.
fn request_kill(child: &mut Child, pid: Option<u32>) {
    match child.start_kill() {
        Ok(()) => tracing::debug!(pid, "Kill requested for renderer"),
        Err(err) if err.kind() == std::io::ErrorKind::InvalidInput => {
            tracing::debug!(pid, "Renderer already exited; nothing to kill")
        }
        Err(err) => tracing::warn!(pid, error = %err, "Failed to kill renderer"),
    }
}

//! Stream watchdog: keeps one renderer output pipe drained and sniffs it
//! for failure markers.
//!
//! A renderer that fills its stdout or stderr pipe blocks forever, so each
//! stream is read continuously on a short interval for as long as it is
//! open. Everything read is kept in a shared buffer that the supervisor can
//! inspect while the watchdog is still running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use htmlpdf_common::error::{HtmlPdfError, OutputStream};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use crate::classifier::FailureClassifier;

/// Captured output carried in error values is capped to this many bytes.
pub const OUTPUT_TAIL_BYTES: usize = 2048;

/// Shared state of one watchdog.
#[derive(Debug, Default)]
pub struct WatchdogState {
    buffer: Mutex<Vec<u8>>,
    running: AtomicBool,
    failed: AtomicBool,
}

impl WatchdogState {
    /// Whether the watchdog is still polling its stream.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether the classifier flagged the stream.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Copy of everything drained so far.
    pub fn output(&self) -> Vec<u8> {
        self.buffer.lock().clone()
    }

    pub fn output_len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// The last `max_bytes` of output as trimmed, lossy UTF-8.
    pub fn output_tail(&self, max_bytes: usize) -> String {
        let buffer = self.buffer.lock();
        let start = buffer.len().saturating_sub(max_bytes);
        String::from_utf8_lossy(&buffer[start..]).trim().to_string()
    }
}

/// How a watchdog stopped.
#[derive(Debug)]
pub enum WatchdogOutcome {
    /// The stream reached end-of-file.
    Drained,
    /// Reading the stream failed.
    ReadFailed(std::io::Error),
    /// The classifier matched the accumulated output.
    FailureDetected(String),
}

impl WatchdogOutcome {
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Drained)
    }
}

/// Terminal signal sent by a watchdog to its supervisor.
#[derive(Debug)]
pub struct WatchdogSignal {
    pub stream: OutputStream,
    pub outcome: WatchdogOutcome,
}

impl WatchdogSignal {
    /// Convert a failure outcome into the error reported to callers.
    /// A drained stream yields `None`.
    pub fn into_error(self, state: &WatchdogState) -> Option<HtmlPdfError> {
        match self.outcome {
            WatchdogOutcome::Drained => None,
            WatchdogOutcome::ReadFailed(source) => Some(HtmlPdfError::StreamRead {
                stream: self.stream,
                source,
            }),
            WatchdogOutcome::FailureDetected(reason) => Some(HtmlPdfError::FailureDetected {
                stream: self.stream,
                reason,
                output: state.output_tail(OUTPUT_TAIL_BYTES),
            }),
        }
    }
}

/// Drains one output stream of the renderer process.
pub struct StreamWatchdog {
    stream: OutputStream,
    state: Arc<WatchdogState>,
    classifier: Arc<dyn FailureClassifier>,
    poll_interval: Duration,
    chunk_size: usize,
}

impl StreamWatchdog {
    pub fn new(
        stream: OutputStream,
        classifier: Arc<dyn FailureClassifier>,
        poll_interval: Duration,
        chunk_size: usize,
    ) -> Self {
        Self {
            stream,
            state: Arc::new(WatchdogState::default()),
            classifier,
            poll_interval,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn stream(&self) -> OutputStream {
        self.stream
    }

    pub fn state(&self) -> Arc<WatchdogState> {
        Arc::clone(&self.state)
    }

    /// Poll `reader` until end-of-stream, a read error, or a classifier match.
    pub async fn run<R>(self, mut reader: R) -> WatchdogOutcome
    where
        R: AsyncRead + Unpin,
    {
        self.state.running.store(true, Ordering::SeqCst);

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut chunk = vec![0u8; self.chunk_size];

        let outcome = loop {
            ticker.tick().await;

            let read = match reader.read(&mut chunk).await {
                Ok(0) => break WatchdogOutcome::Drained,
                Ok(read) => read,
                Err(err) => break WatchdogOutcome::ReadFailed(err),
            };

            let verdict = {
                let mut buffer = self.state.buffer.lock();
                buffer.extend_from_slice(&chunk[..read]);
                self.classifier.classify(&buffer)
            };
            if let Some(reason) = verdict {
                self.state.failed.store(true, Ordering::SeqCst);
                break WatchdogOutcome::FailureDetected(reason);
            }
        };

        self.state.running.store(false, Ordering::SeqCst);
        match &outcome {
            WatchdogOutcome::Drained => tracing::trace!(
                stream = %self.stream,
                bytes = self.state.output_len(),
                "Stream drained"
            ),
            WatchdogOutcome::ReadFailed(err) => tracing::warn!(
                stream = %self.stream,
                error = %err,
                "Stream read failed"
            ),
            WatchdogOutcome::FailureDetected(reason) => tracing::warn!(
                stream = %self.stream,
                classifier = self.classifier.name(),
                reason = %reason,
                output = %self.state.output_tail(OUTPUT_TAIL_BYTES),
                "Renderer output flagged as failure"
            ),
        }
        outcome
    }

    /// Run inside `set` and deliver the terminal signal over `signals`.
    /// The watchdog stops when the set is dropped.
    pub fn spawn_in<R>(
        self,
        set: &mut JoinSet<()>,
        reader: R,
        signals: mpsc::Sender<WatchdogSignal>,
    ) -> AbortHandle
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        set.spawn(async move {
            let stream = self.stream;
            let outcome = self.run(reader).await;
            // The supervisor may already have returned; nobody is left to tell.
            let _ = signals.send(WatchdogSignal { stream, outcome }).await;
        })
    }
}

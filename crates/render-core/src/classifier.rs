//! Output classifiers: decide whether drained renderer output signals a failure.
//!
//! Chrome reports most problems only as free-form text on stdout/stderr, so
//! the default classifier is a plain substring match. It lives behind a trait
//! so supervision does not depend on the heuristic.

/// Inspects the accumulated output of one stream.
pub trait FailureClassifier: Send + Sync {
    /// Return a reason when `output` indicates the renderer has failed.
    fn classify(&self, output: &[u8]) -> Option<String>;

    /// Classifier name for logs.
    fn name(&self) -> &str;
}

/// Flags output that contains a marker, ignoring ASCII case.
#[derive(Debug, Clone)]
pub struct SubstringClassifier {
    needle: Vec<u8>,
    reason: String,
}

impl SubstringClassifier {
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        Self {
            needle: pattern.to_ascii_lowercase().into_bytes(),
            reason: format!("output contains '{pattern}' string"),
        }
    }
}

impl Default for SubstringClassifier {
    fn default() -> Self {
        Self::new("error")
    }
}

impl FailureClassifier for SubstringClassifier {
    fn classify(&self, output: &[u8]) -> Option<String> {
        if self.needle.is_empty() || output.len() < self.needle.len() {
            return None;
        }
        output
            .windows(self.needle.len())
            .any(|window| window.eq_ignore_ascii_case(&self.needle))
            .then(|| self.reason.clone())
    }

    fn name(&self) -> &str {
        "substring"
    }
}

/// Never flags anything; only exit status decides.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverFail;

impl FailureClassifier for NeverFail {
    fn classify(&self, _output: &[u8]) -> Option<String> {
        None
    }

    fn name(&self) -> &str {
        "never"
    }
}

//! End-to-end renders against scripted stand-ins for Chrome.
#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use htmlpdf_common::config::{RendererConfig, DEFAULT_RENDERER_ARGS};
use htmlpdf_common::error::{HtmlPdfError, OutputStream};
use htmlpdf_core::{NeverFail, PdfSource, Renderer};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

/// Fake renderer: pulls the output path and input file out of its
/// arguments and writes a minimal PDF wrapping the html.
const FAKE_CHROME: &str = r#"
out=""
in=""
for arg in "$@"; do
  case "$arg" in
    --print-to-pdf=*) out="${arg#--print-to-pdf=}" ;;
    file://*) in="${arg#file://}" ;;
  esac
done
printf '%%PDF-1.4\n' > "$out"
cat "$in" >> "$out"
printf '\n%%%%EOF\n' >> "$out"
"#;

struct Harness {
    dir: TempDir,
    jobs: PathBuf,
}

impl Harness {
    fn new() -> Self {
        htmlpdf_common::logging::init_test_logging();
        let dir = TempDir::new().expect("temp dir");
        let jobs = dir.path().join("jobs");
        std::fs::create_dir(&jobs).expect("jobs dir");
        Self { dir, jobs }
    }

    /// Renderer running `body` through /bin/sh ahead of the usual flags.
    /// Going through the shell avoids exec'ing a freshly written file.
    fn renderer(&self, name: &str, body: &str) -> Renderer {
        let script = self.dir.path().join(name);
        std::fs::write(&script, body).expect("write script");

        let mut args = vec![script.to_string_lossy().into_owned()];
        args.extend(DEFAULT_RENDERER_ARGS.iter().map(|a| a.to_string()));
        Renderer::new(RendererConfig {
            chrome_path: PathBuf::from("/bin/sh"),
            args,
            drain_grace_ms: 200,
            temp_dir: Some(self.jobs.clone()),
            ..RendererConfig::default()
        })
    }

    fn leftover_files(&self) -> Vec<PathBuf> {
        list(&self.jobs)
    }
}

fn list(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("entry").path())
        .collect()
}

#[tokio::test]
async fn hello_world_renders_a_pdf() {
    let harness = Harness::new();
    let renderer = harness.renderer("chrome.sh", FAKE_CHROME);

    let pdf = renderer
        .create(b"<h1>Hello, World!</h1>")
        .await
        .expect("render");
    let bytes = pdf.read_all().await.expect("read pdf");

    assert!(bytes.starts_with(b"%PDF-"));
    assert!(!pdf.is_empty());
    assert_eq!(pdf.len(), bytes.len() as u64);
    assert!(String::from_utf8_lossy(&bytes).contains("<h1>Hello, World!</h1>"));

    // Only the output artifact remains; the html input is gone.
    assert_eq!(harness.leftover_files(), vec![pdf.path().to_path_buf()]);
    let file_name = pdf.path().file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with("tempPDF"), "{file_name}");

    drop(pdf);
    assert!(harness.leftover_files().is_empty());
}

#[tokio::test]
async fn renderer_receives_exact_flags() {
    let harness = Harness::new();
    let args_log = harness.dir.path().join("args.log");
    let script = format!(
        "printf '%s\\n' \"$@\" > '{}'\n{FAKE_CHROME}",
        args_log.display()
    );
    let renderer = harness.renderer("chrome.sh", &script);

    let pdf = renderer.create(b"<p>flags</p>").await.expect("render");
    let logged = std::fs::read_to_string(&args_log).expect("args log");
    let args: Vec<&str> = logged.lines().collect();

    assert_eq!(&args[..10], &DEFAULT_RENDERER_ARGS[..]);
    assert_eq!(args[10], format!("--print-to-pdf={}", pdf.path().display()));
    assert!(args[11].starts_with("file://"));
    assert!(args[11].contains("htmlToPdf"));
    assert_eq!(args.len(), 12);
}

#[tokio::test]
async fn invalid_input_exit_is_a_process_failure() {
    let harness = Harness::new();
    let renderer = harness.renderer(
        "chrome.sh",
        "echo 'Error: invalid input' >&2\nexit 1\n",
    );

    let err = renderer.create(b"").await.expect_err("render must fail");

    assert!(err.is_process_failure(), "unexpected error: {err:?}");
    assert!(err.to_string().contains("Error: invalid input"), "{err}");
    assert!(harness.leftover_files().is_empty());
}

#[tokio::test]
async fn silent_nonzero_exit_reports_status() {
    let harness = Harness::new();
    let renderer = harness.renderer("chrome.sh", "exit 21\n");

    let err = renderer.create(b"<p>x</p>").await.expect_err("exit 21");
    match err {
        HtmlPdfError::Exit { code, .. } => assert_eq!(code, Some(21)),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(harness.leftover_files().is_empty());
}

#[tokio::test]
async fn hung_renderer_printing_error_is_killed() {
    let harness = Harness::new();
    let renderer = harness.renderer(
        "chrome.sh",
        "echo '[1019/101010.1:ERROR:headless_shell.cc] Abnormal renderer termination' >&2\nexec sleep 60\n",
    );

    let started = Instant::now();
    let err = tokio::time::timeout(Duration::from_secs(15), renderer.create(b"<p>x</p>"))
        .await
        .expect("render must not hang")
        .expect_err("render must fail");

    match &err {
        HtmlPdfError::FailureDetected { stream, output, .. } => {
            assert_eq!(*stream, OutputStream::Stderr);
            assert!(output.contains("Abnormal renderer termination"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(15));
    assert!(harness.leftover_files().is_empty());
}

#[tokio::test]
async fn error_text_fails_even_with_clean_exit() {
    let harness = Harness::new();
    let script = format!("{FAKE_CHROME}\necho 'GPU process error, falling back'\n");
    let renderer = harness.renderer("chrome.sh", &script);

    let err = renderer.create(b"<p>x</p>").await.expect_err("flagged");
    assert!(err.is_detected_failure(), "unexpected error: {err:?}");
    assert!(harness.leftover_files().is_empty());
}

#[tokio::test]
async fn custom_classifier_can_ignore_error_text() {
    let harness = Harness::new();
    let script = format!("{FAKE_CHROME}\necho 'GPU process error, falling back'\n");
    let renderer = harness
        .renderer("chrome.sh", &script)
        .with_classifier(Arc::new(NeverFail));

    let pdf = renderer.create(b"<p>x</p>").await.expect("render");
    assert!(pdf.read_all().await.unwrap().starts_with(b"%PDF-"));
}

#[tokio::test]
async fn empty_output_is_rejected() {
    let harness = Harness::new();
    let renderer = harness.renderer("chrome.sh", "exit 0\n");

    let err = renderer.create(b"<p>x</p>").await.expect_err("empty pdf");
    assert!(matches!(err, HtmlPdfError::EmptyOutput { .. }), "{err:?}");
    assert!(harness.leftover_files().is_empty());
}

#[tokio::test]
async fn missing_renderer_is_a_spawn_error() {
    let harness = Harness::new();
    let renderer = Renderer::new(RendererConfig {
        chrome_path: harness.dir.path().join("no-such-chrome"),
        temp_dir: Some(harness.jobs.clone()),
        ..RendererConfig::default()
    });

    assert!(!renderer.is_available());
    let err = renderer.create(b"<p>x</p>").await.expect_err("spawn");
    assert!(matches!(err, HtmlPdfError::Spawn { .. }), "{err:?}");
    assert!(!err.is_process_failure());
    assert!(harness.leftover_files().is_empty());
}

#[tokio::test]
async fn concurrent_renders_stay_isolated() {
    let harness = Harness::new();
    let renderer = harness.renderer("chrome.sh", FAKE_CHROME);

    let mut tasks = Vec::new();
    for i in 0..8 {
        let renderer = renderer.clone();
        tasks.push(tokio::spawn(async move {
            let html = format!("<p>document {i}</p>");
            let pdf = renderer.create(html.as_bytes()).await.expect("render");
            let bytes = pdf.read_all().await.expect("read");
            (html, pdf, bytes)
        }));
    }

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.expect("join"));
    }

    let mut paths: Vec<PathBuf> = results.iter().map(|(_, pdf, _)| pdf.path().to_path_buf()).collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 8);

    for (html, _, bytes) in &results {
        let text = String::from_utf8_lossy(bytes);
        assert!(text.contains(html.as_str()), "{text}");
        assert_eq!(text.matches("document").count(), 1);
    }
    assert_eq!(harness.leftover_files().len(), 8);

    drop(results);
    assert!(harness.leftover_files().is_empty());
}

#[tokio::test]
async fn independent_instances_use_their_own_renderer() {
    let harness = Harness::new();
    let primary = harness.renderer("primary.sh", FAKE_CHROME);
    let broken = harness.renderer("broken.sh", "echo 'segfault' >&2\nexit 139\n");

    let (ok, failed) = tokio::join!(primary.create(b"<p>a</p>"), broken.create(b"<p>b</p>"));
    assert!(ok.expect("primary renders").read_all().await.unwrap().starts_with(b"%PDF-"));
    assert!(matches!(failed, Err(HtmlPdfError::Exit { code: Some(139), .. })));
}

#[tokio::test]
async fn pdf_source_stream_cleans_up_after_reading() {
    let harness = Harness::new();
    let renderer = harness.renderer("chrome.sh", FAKE_CHROME);
    let source: &dyn PdfSource = &renderer;

    let mut stream = source
        .create_pdf(b"<h1>streamed</h1>".to_vec())
        .await
        .expect("render");
    assert_eq!(harness.leftover_files().len(), 1);

    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).await.expect("read");
    assert!(bytes.starts_with(b"%PDF-"));
    assert_eq!(source.name(), "chrome");

    drop(stream);
    assert!(harness.leftover_files().is_empty());
}

#[tokio::test]
async fn persisted_pdf_outlives_the_handle() {
    let harness = Harness::new();
    let renderer = harness.renderer("chrome.sh", FAKE_CHROME);
    let dest = harness.dir.path().join("hello.pdf");

    let pdf = renderer.create(b"<h1>keep me</h1>").await.expect("render");
    pdf.persist(&dest).expect("persist");

    assert!(std::fs::read(&dest).unwrap().starts_with(b"%PDF-"));
    assert!(harness.leftover_files().is_empty());
}

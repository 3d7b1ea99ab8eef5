//! htmlpdf Core
//!
//! Renders HTML to PDF by driving a headless Chrome process and watching
//! it closely enough that a failing or hung browser cannot wedge the
//! caller.
//!
//! # Pipeline Architecture
//!
//! ```text
//! html bytes ──► htmlToPdf*.html ──┐
//!                                  ├── chrome --headless ... --print-to-pdf=<out> file://<in>
//! tempPDF*.pdf (reserved) ─────────┘        │
//!                                  ┌────────┴────────┐
//!                               stdout            stderr
//!                                  │                 │
//!                           StreamWatchdog    StreamWatchdog
//!                                  └──── signal ─────┤
//!                                                    ▼
//!                               ProcessSupervisor: exit vs. failure ──► kill
//!                                                    │
//!                                                    ▼
//!                                              RenderedPdf
//! ```
//!
//! ```rust,no_run
//! # async fn demo() -> htmlpdf_common::HtmlPdfResult<()> {
//! let renderer = htmlpdf_core::Renderer::default();
//! let pdf = renderer.create(b"<h1>Hello, World!</h1>").await?;
//! pdf.persist("hello.pdf")?;
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod pipeline;
pub mod source;
pub mod supervisor;
pub mod watchdog;

pub use classifier::{FailureClassifier, NeverFail, SubstringClassifier};
pub use pipeline::{PdfFile, RenderJob, RenderedPdf, Renderer};
pub use source::{PdfSource, PdfStream};
pub use supervisor::{Invocation, ProcessSupervisor, SupervisedRun};

//! Progress-callback trait for per-stage conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves from one [`Stage`] to the next.
//!
//! The browser stage dominates wall-clock time (often seconds, against
//! milliseconds for everything else), so the callback also receives each line
//! the renderer prints, letting a CLI show something while Chrome works.
//!
//! # Example
//!
//! ```rust
//! use edgequake_md2pdf::{ConversionConfig, ConversionProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ConversionProgressCallback for Printer {
//!     fn on_stage_start(&self, stage: Stage) {
//!         eprintln!("→ {stage}");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One step of the conversion pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Reading the Markdown source (file, URL, stdin, reader).
    ReadInput,
    /// Running the user's Markdown preprocessing hook.
    PreprocessMarkdown,
    /// Parsing Markdown and highlighting code blocks.
    MarkdownToHtml,
    /// Running the user's HTML preprocessing hook.
    PreprocessHtml,
    /// Wrapping the body in a full document with styles and page rules.
    AssembleDocument,
    /// Writing the document to a temporary `.html` file.
    WriteHtml,
    /// Waiting for the external renderer.
    Render,
    /// Reading the temporary `.pdf` file back.
    ReadPdf,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 8] = [
        Stage::ReadInput,
        Stage::PreprocessMarkdown,
        Stage::MarkdownToHtml,
        Stage::PreprocessHtml,
        Stage::AssembleDocument,
        Stage::WriteHtml,
        Stage::Render,
        Stage::ReadPdf,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::ReadInput => "reading input",
            Stage::PreprocessMarkdown => "Markdown preprocessing",
            Stage::MarkdownToHtml => "Markdown → HTML",
            Stage::PreprocessHtml => "HTML preprocessing",
            Stage::AssembleDocument => "assembling document",
            Stage::WriteHtml => "writing HTML",
            Stage::Render => "rendering PDF",
            Stage::ReadPdf => "reading PDF",
        };
        f.write_str(s)
    }
}

/// Called by the conversion pipeline as it moves through its stages.
///
/// Implementations must be `Send + Sync`: the renderer's output lines are
/// delivered from the tasks draining the child's stdout and stderr. All
/// methods have default no-op implementations so callers only override what
/// they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called when `stage` begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when `stage` finishes.
    ///
    /// `bytes` is the size of the stage's output (Markdown, HTML or PDF).
    fn on_stage_complete(&self, stage: Stage, bytes: usize) {
        let _ = (stage, bytes);
    }

    /// Called for every line the renderer prints on stdout or stderr.
    fn on_renderer_output(&self, line: &str) {
        let _ = line;
    }

    /// Called once after the PDF is in memory.
    fn on_conversion_complete(&self, pdf_bytes: usize) {
        let _ = pdf_bytes;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// For APIs that require a callback value. A config without one
/// (`progress_callback: None`, the default) emits no events at all.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

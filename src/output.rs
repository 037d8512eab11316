//! Result types returned by the conversion entry points.

use serde::{Deserialize, Serialize};

/// The product of one conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// The PDF file contents.
    pub pdf: Vec<u8>,
    /// The complete HTML document that was handed to the renderer.
    pub html: String,
    /// Sizes and timings.
    pub stats: ConversionStats,
}

/// Sizes and timings of a conversion.
///
/// Serialised as-is by `md2pdf --json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Markdown size after the preprocessing hook.
    pub markdown_bytes: usize,
    /// HTML body size after the preprocessing hook.
    pub html_bytes: usize,
    /// Size of the assembled document.
    pub document_bytes: usize,
    /// PDF size. Zero when the conversion stopped before rendering.
    pub pdf_bytes: usize,
    /// Fenced and indented code blocks in the document.
    pub code_blocks: usize,
    /// Code blocks that were syntax highlighted.
    pub highlighted_blocks: usize,
    /// Reading the input and running the Markdown hook.
    pub read_duration_ms: u64,
    /// Markdown parsing, highlighting, HTML hook and document assembly.
    pub html_duration_ms: u64,
    /// Browser run, including writing the HTML and reading the PDF back.
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

//! Error types for the edgequake-md2pdf library.
//!
//! Every failure in the pipeline is fatal: a half-rendered PDF is worse than
//! none, so stages propagate [`Md2PdfError`] straight up to the caller. The
//! one exception is syntax highlighting, which degrades to escaped plain code
//! and only logs a warning.

use crate::progress::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-md2pdf library.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Markdown file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The input bytes are not valid UTF-8 text.
    #[error("Input '{source_name}' is not valid UTF-8 text (invalid byte at offset {offset})")]
    InvalidUtf8 { source_name: String, offset: usize },

    /// Could not read a stylesheet, runnings file or similar asset.
    #[error("Failed to read {what} '{path}': {source}")]
    AssetReadFailed {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// A user-supplied preprocessing hook rejected its input.
    #[error("{stage} hook failed: {reason}")]
    Preprocess { stage: Stage, reason: String },

    /// The runnings template is not valid TOML or has unknown keys.
    #[error("Invalid runnings template '{path}': {reason}")]
    InvalidRunnings { path: PathBuf, reason: String },

    /// An unknown highlight theme was requested.
    #[error("Unknown highlight theme '{name}'\nAvailable: {available}")]
    UnknownTheme { name: String, available: String },

    // ── Renderer errors ───────────────────────────────────────────────────
    /// No browser was configured and none could be found.
    #[error(
        "No headless browser available: {0}\n\n\
md2pdf prints through a Chromium-family browser. You can:\n\
  • Install Chromium or Google Chrome.\n\
  • Set MD2PDF_BROWSER=/path/to/chrome to use a specific binary.\n\
  • Pass --browser /path/to/chrome on the command line.\n"
    )]
    BrowserNotFound(#[from] browser_locate::BrowserLocateError),

    /// The configured browser path is missing or cannot be made executable.
    #[error(
        "Cannot run browser '{path}': {source}\n\
Check the path given with --browser or MD2PDF_BROWSER."
    )]
    BrowserUnusable {
        path: PathBuf,
        #[source]
        source: browser_locate::BrowserLocateError,
    },

    /// The renderer process could not be started.
    #[error("Failed to launch renderer '{path}': {source}")]
    RendererSpawnFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The renderer exited with a non-zero status.
    #[error("Renderer exited with {status}\n{stderr}")]
    RendererFailed { status: String, stderr: String },

    /// The renderer did not finish in time and was killed.
    #[error("Renderer timed out after {ms}ms\nIncrease --load-timeout or --render-delay.")]
    RendererTimeout { ms: u64 },

    /// The renderer exited cleanly but produced no PDF.
    #[error("Renderer produced no PDF at '{path}'")]
    EmptyPdf { path: PathBuf },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create, write or read a temporary file.
    #[error("Temporary file error: {0}")]
    TempFile(#[source] std::io::Error),

    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the PDF into a caller-supplied writer failed.
    #[error("Failed to write PDF to the output stream: {0}")]
    StreamWriteFailed(#[source] std::io::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

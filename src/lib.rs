//! # edgequake-md2pdf
//!
//! Convert Markdown documents to PDF through a headless browser.
//!
//! ## Why a browser?
//!
//! Laying out text, tables, images and page breaks is exactly what a browser
//! engine is good at, and CSS already has a vocabulary for paper size,
//! margins and running headers (`@page`). So this crate turns Markdown into
//! a self-contained HTML document and lets Chromium print it, rather than
//! re-implementing a typesetter.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Input     read a local file, download a URL, or read stdin
//!  ├─ 2. Hook      user transform on the Markdown text
//!  ├─ 3. HTML      pulldown-cmark + syntect highlighting (spawn_blocking)
//!  ├─ 4. Hook      user transform on the HTML body
//!  ├─ 5. Document  stylesheets, @page size/margins, runnings, <base href>
//!  ├─ 6. Render    headless Chromium --print-to-pdf in a temp directory
//!  └─ 7. Output    PDF bytes (or a chunked stream) + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_md2pdf::{convert_to_file, ConversionConfig, PaperFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Browser auto-detected from MD2PDF_BROWSER, PATH, or standard install paths
//!     let config = ConversionConfig::builder()
//!         .paper_format(PaperFormat::Letter)
//!         .runnings_path("runnings.toml")
//!         .build()?;
//!     let stats = convert_to_file("README.md", "README.pdf", &config).await?;
//!     eprintln!("{} bytes in {}ms", stats.pdf_bytes, stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-md2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod runnings;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, MarkdownOptions, MarkdownPreset, PaperBorder,
    PaperFormat, PaperOrientation,
};
pub use convert::{convert, convert_str, convert_sync, convert_to_file, render_document};
pub use error::Md2PdfError;
pub use output::{ConversionOutput, ConversionStats};
pub use pipeline::markdown::MarkdownPlugin;
pub use pipeline::render::{ChromeRenderer, PdfRenderer, RenderJob};
pub use pipeline::transform::{Chain, Identity, Transform};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use runnings::{RunningBand, Runnings};
pub use stream::{convert_reader, convert_to_writer, PdfStream};

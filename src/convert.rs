//! Eager (whole-document) conversion entry points.
//!
//! These wait for the renderer to finish and return the PDF in memory. Use
//! [`crate::stream::convert_reader`] instead when the PDF should be handed on
//! in chunks, e.g. piped into a socket or an HTTP response body.
//!
//! Every call builds a fresh pipeline: hooks, stylesheets and the runnings
//! template are loaded again and the renderer gets its own temp directory,
//! so concurrent conversions never share state.

use crate::config::ConversionConfig;
use crate::error::Md2PdfError;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::render::{self, RenderJob};
use crate::pipeline::transform::Transform;
use crate::pipeline::{document, input, markdown};
use crate::progress::Stage;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info};

/// File names inside the per-conversion temp directory.
const HTML_FILE: &str = "document.html";
const PDF_FILE: &str = "document.pdf";

/// Convert a Markdown file, URL or `-` (stdin) to PDF.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str` — Local file path, HTTP/HTTPS URL, or `-` for standard input
/// * `config` — Conversion configuration
///
/// # Errors
/// Every failure is fatal: unreadable input, a hook returning an error, a
/// missing stylesheet, no browser, or a renderer that fails or times out.
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    let started = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    stage_start(config, Stage::ReadInput);
    let markdown = input::read_input(input_str, config.download_timeout_secs).await?;
    stage_complete(config, Stage::ReadInput, markdown.len());

    convert_markdown(markdown, config, started).await
}

/// Convert Markdown held in memory to PDF.
///
/// # Example
/// ```rust,no_run
/// use edgequake_md2pdf::{convert_str, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let output = convert_str("# Hello\n\nWorld", &ConversionConfig::default()).await?;
/// std::fs::write("hello.pdf", &output.pdf)?;
/// # Ok(())
/// # }
/// ```
pub async fn convert_str(
    markdown: impl Into<String>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    convert_markdown(markdown.into(), config, Instant::now()).await
}

/// Convert to PDF and write the result to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Md2PdfError> {
    let output = convert(input_str, config).await?;
    write_atomic(output_path.as_ref(), &output.pdf).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Md2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Run every stage up to (not including) the renderer and return the HTML
/// document that would be printed.
///
/// Needs no browser. Useful for debugging stylesheets and hooks.
pub async fn render_document(
    markdown: impl Into<String>,
    config: &ConversionConfig,
) -> Result<String, Md2PdfError> {
    let mut stats = ConversionStats::default();
    prepare_document(markdown.into(), config, &mut stats).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// A finished PDF still sitting in its conversion's temp directory.
///
/// Dropping it removes the directory.
pub(crate) struct RenderedPdf {
    pub dir: TempDir,
    pub pdf_path: PathBuf,
    pub html: String,
    pub stats: ConversionStats,
}

async fn convert_markdown(
    markdown: String,
    config: &ConversionConfig,
    started: Instant,
) -> Result<ConversionOutput, Md2PdfError> {
    let rendered = render_markdown(markdown, config, started).await?;
    let RenderedPdf {
        dir,
        pdf_path,
        html,
        mut stats,
    } = rendered;

    let read_started = Instant::now();
    stage_start(config, Stage::ReadPdf);
    let pdf = tokio::fs::read(&pdf_path)
        .await
        .map_err(Md2PdfError::TempFile)?;
    stage_complete(config, Stage::ReadPdf, pdf.len());
    drop(dir);

    stats.pdf_bytes = pdf.len();
    stats.render_duration_ms += elapsed_ms(read_started);
    stats.total_duration_ms = elapsed_ms(started);

    info!(
        "Conversion complete: {} bytes of PDF, {}ms total",
        stats.pdf_bytes, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(pdf.len());
    }

    Ok(ConversionOutput { pdf, html, stats })
}

/// Run the text stages and the renderer, leaving the PDF on disk.
pub(crate) async fn render_markdown(
    markdown: String,
    config: &ConversionConfig,
    started: Instant,
) -> Result<RenderedPdf, Md2PdfError> {
    let mut stats = ConversionStats {
        read_duration_ms: elapsed_ms(started),
        ..Default::default()
    };
    let html = prepare_document(markdown, config, &mut stats).await?;

    let render_started = Instant::now();
    let renderer = render::resolve_renderer(config)?;

    let dir = tempfile::Builder::new()
        .prefix("md2pdf-")
        .tempdir()
        .map_err(Md2PdfError::TempFile)?;
    let html_path = dir.path().join(HTML_FILE);
    let pdf_path = dir.path().join(PDF_FILE);

    // ── Write HTML ───────────────────────────────────────────────────────
    stage_start(config, Stage::WriteHtml);
    tokio::fs::write(&html_path, &html)
        .await
        .map_err(Md2PdfError::TempFile)?;
    stage_complete(config, Stage::WriteHtml, html.len());
    debug!("Wrote {} ({} bytes)", html_path.display(), html.len());

    // ── Render ───────────────────────────────────────────────────────────
    let job = RenderJob {
        html_path,
        pdf_path: pdf_path.clone(),
        work_dir: dir.path().to_path_buf(),
        cwd: config.cwd.clone(),
        render_delay_ms: config.render_delay_ms,
        load_timeout_ms: config.load_timeout_ms,
        progress: config.progress_callback.clone(),
    };

    stage_start(config, Stage::Render);
    info!("Rendering with {}", renderer.name());
    renderer.render(&job).await?;

    let pdf_len = match tokio::fs::metadata(&pdf_path).await {
        Ok(meta) if meta.len() > 0 => meta.len() as usize,
        _ => return Err(Md2PdfError::EmptyPdf { path: pdf_path }),
    };
    stage_complete(config, Stage::Render, pdf_len);

    stats.pdf_bytes = pdf_len;
    stats.render_duration_ms = elapsed_ms(render_started);
    stats.total_duration_ms = elapsed_ms(started);

    Ok(RenderedPdf {
        dir,
        pdf_path,
        html,
        stats,
    })
}

/// Markdown hook → HTML → HTML hook → full document.
async fn prepare_document(
    markdown: String,
    config: &ConversionConfig,
    stats: &mut ConversionStats,
) -> Result<String, Md2PdfError> {
    // ── Preprocess Markdown ──────────────────────────────────────────────
    let hook_started = Instant::now();
    stage_start(config, Stage::PreprocessMarkdown);
    let source = run_hook(
        config.preprocess_markdown.as_ref(),
        markdown,
        Stage::PreprocessMarkdown,
    )?;
    stage_complete(config, Stage::PreprocessMarkdown, source.len());
    stats.markdown_bytes = source.len();
    stats.read_duration_ms += elapsed_ms(hook_started);

    // ── Markdown → HTML ──────────────────────────────────────────────────
    // Highlighting is CPU-bound; keep it off the async workers.
    let html_started = Instant::now();
    stage_start(config, Stage::MarkdownToHtml);
    let options = config.markdown.clone();
    let rendered = tokio::task::spawn_blocking(move || markdown::render_html(&source, &options))
        .await
        .map_err(|e| Md2PdfError::Internal(format!("Markdown rendering task failed: {e}")))?;
    stage_complete(config, Stage::MarkdownToHtml, rendered.html.len());
    stats.code_blocks = rendered.code_blocks;
    stats.highlighted_blocks = rendered.highlighted_blocks;

    // ── Preprocess HTML ──────────────────────────────────────────────────
    stage_start(config, Stage::PreprocessHtml);
    let body = run_hook(
        config.preprocess_html.as_ref(),
        rendered.html,
        Stage::PreprocessHtml,
    )?;
    stage_complete(config, Stage::PreprocessHtml, body.len());
    stats.html_bytes = body.len();

    // ── Assemble document ────────────────────────────────────────────────
    stage_start(config, Stage::AssembleDocument);
    let assets = document::load_assets(config).await?;
    let doc = document::build_document(&body, &assets, config)?;
    stage_complete(config, Stage::AssembleDocument, doc.len());
    stats.document_bytes = doc.len();
    stats.html_duration_ms = elapsed_ms(html_started);

    Ok(doc)
}

/// Apply a user hook, attributing any failure to `stage`.
fn run_hook(hook: &dyn Transform, text: String, stage: Stage) -> Result<String, Md2PdfError> {
    hook.apply(text).map_err(|e| match e {
        Md2PdfError::Preprocess { .. } => e,
        other => Md2PdfError::Preprocess {
            stage,
            reason: other.to_string(),
        },
    })
}

pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Md2PdfError> {
    let write_err = |e| Md2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

pub(crate) fn stage_start(config: &ConversionConfig, stage: Stage) {
    debug!("Stage started: {}", stage);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
}

pub(crate) fn stage_complete(config: &ConversionConfig, stage: Stage, bytes: usize) {
    debug!("Stage complete: {} ({} bytes)", stage, bytes);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage, bytes);
    }
}

pub(crate) fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

//! CLI binary for edgequake-md2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and writes the PDF.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_md2pdf::pipeline::{input, markdown};
use edgequake_md2pdf::{
    convert, convert_to_file, render_document, ConversionConfig, ConversionProgressCallback,
    ConversionStats, MarkdownOptions, MarkdownPreset, PaperBorder, PaperFormat, PaperOrientation,
    ProgressCallback, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner naming the current stage.
///
/// The renderer stage dominates wall-clock time, so its output lines are
/// shown as the spinner message while it runs.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        let prefix = match stage {
            Stage::Render => "Rendering",
            Stage::ReadPdf => "Finishing",
            _ => "Preparing",
        };
        self.bar.set_prefix(prefix);
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_renderer_output(&self, line: &str) {
        // Keep the spinner on one line.
        let line: String = line.chars().take(72).collect();
        self.bar.set_message(dim(&line));
    }

    fn on_conversion_complete(&self, _pdf_bytes: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (stdin → stdout)
  cat README.md | md2pdf > README.pdf

  # Convert to file
  md2pdf README.md -o README.pdf

  # Letter paper, landscape, narrow margins
  md2pdf --paper-format letter --orientation landscape --border 1cm notes.md -o notes.pdf

  # Page numbers in the footer
  md2pdf --runnings runnings.toml report.md -o report.pdf

  # Convert from URL, resolving images against a local checkout
  md2pdf https://example.com/guide.md --cwd ./guide -o guide.pdf

  # Inspect the HTML that would be printed (no browser needed)
  md2pdf --html-only README.md -o README.html

  # Running as root in a container
  md2pdf --browser-arg=--no-sandbox README.md -o README.pdf

RUNNINGS TEMPLATE (TOML):
  skip_first_page = true

  [header]
  left = "Quarterly report"

  [footer]
  center = "Page {page} of {pages}"

ENVIRONMENT VARIABLES:
  MD2PDF_BROWSER   Path to a Chromium-family browser (skips auto-detection)
  RUST_LOG         Override log filtering (e.g. RUST_LOG=edgequake_md2pdf=debug)

SETUP:
  md2pdf prints through a headless Chromium, Google Chrome or Microsoft Edge.
  It looks for MD2PDF_BROWSER, then PATH, then the standard install locations.
"#;

/// Convert Markdown files and URLs to PDF.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert Markdown files and URLs to PDF",
    long_about = "Convert Markdown (local files, URLs or standard input) to PDF. The Markdown is \
rendered to HTML with highlighted code blocks, styled, and printed to PDF by a headless \
Chromium-family browser.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file path, HTTP/HTTPS URL, or `-` for stdin.
    #[arg(default_value = "-")]
    input: String,

    /// Write the PDF to this file instead of stdout.
    #[arg(short, long, env = "MD2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Base directory for relative images and links. Default: the input
    /// file's directory, or the current directory for stdin and URLs.
    #[arg(long, env = "MD2PDF_CWD")]
    cwd: Option<PathBuf>,

    /// TOML template for running headers and footers.
    #[arg(long, env = "MD2PDF_RUNNINGS")]
    runnings: Option<PathBuf>,

    /// Document stylesheet (replaces the built-in one).
    #[arg(long, env = "MD2PDF_CSS")]
    css: Option<PathBuf>,

    /// Stylesheet for highlighted code (replaces the generated one).
    #[arg(long, env = "MD2PDF_HIGHLIGHT_CSS")]
    highlight_css: Option<PathBuf>,

    /// Highlight theme used to generate the code stylesheet.
    #[arg(long, env = "MD2PDF_THEME", default_value = markdown::DEFAULT_THEME)]
    theme: String,

    /// Paper size: A3, A4, A5, Legal, Letter, Tabloid, or WIDTHxHEIGHT (e.g. 210mmx99mm).
    #[arg(long, env = "MD2PDF_PAPER_FORMAT", default_value = "A4")]
    paper_format: PaperFormat,

    /// Paper orientation: portrait or landscape.
    #[arg(long, env = "MD2PDF_ORIENTATION", default_value = "portrait")]
    orientation: PaperOrientation,

    /// Page margins: one CSS length, or "vertical horizontal", or "top right bottom left".
    #[arg(long, env = "MD2PDF_BORDER", default_value = "2cm")]
    border: PaperBorder,

    /// Milliseconds to wait after the page loads before printing.
    #[arg(long, env = "MD2PDF_RENDER_DELAY", default_value_t = 0)]
    render_delay: u64,

    /// Page-load timeout in milliseconds.
    #[arg(long, env = "MD2PDF_LOAD_TIMEOUT", default_value_t = 10_000)]
    load_timeout: u64,

    /// Markdown extension preset: default, commonmark, full.
    #[arg(long, env = "MD2PDF_PRESET", default_value = "default")]
    preset: MarkdownPreset,

    /// Enable an extra Markdown rule (table, strikethrough, footnote, tasklist, …). Repeatable.
    #[arg(long = "syntax", env = "MD2PDF_SYNTAX", value_delimiter = ',')]
    syntax: Vec<String>,

    /// Keep single newlines inside paragraphs as spaces instead of line breaks.
    #[arg(long, env = "MD2PDF_NO_BREAKS")]
    no_breaks: bool,

    /// Pass raw HTML in the Markdown through instead of escaping it.
    #[arg(long, env = "MD2PDF_HTML")]
    html: bool,

    /// Smart quotes and dashes.
    #[arg(long, env = "MD2PDF_TYPOGRAPHER")]
    typographer: bool,

    /// Browser executable (skips auto-detection).
    #[arg(long, env = "MD2PDF_BROWSER")]
    browser: Option<PathBuf>,

    /// Extra switch for the browser, e.g. --browser-arg=--no-sandbox. Repeatable.
    #[arg(long = "browser-arg", env = "MD2PDF_BROWSER_ARGS", value_delimiter = ' ', allow_hyphen_values = true)]
    browser_args: Vec<String>,

    /// Write the assembled HTML document instead of a PDF.
    #[arg(long, env = "MD2PDF_HTML_ONLY")]
    html_only: bool,

    /// Print conversion stats as JSON to stderr.
    #[arg(long, env = "MD2PDF_JSON")]
    json: bool,

    /// List the bundled highlight themes and exit.
    #[arg(long)]
    list_themes: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "MD2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2PDF_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "MD2PDF_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; it
    // already shows what the pipeline is doing.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.html_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── List themes ──────────────────────────────────────────────────────
    if cli.list_themes {
        for name in markdown::theme_names() {
            if name == markdown::DEFAULT_THEME {
                println!("{name} {}", dim("(default)"));
            } else {
                println!("{name}");
            }
        }
        return Ok(());
    }

    let spinner = show_progress.then(CliProgressCallback::new);
    let progress_cb = spinner
        .clone()
        .map(|cb| cb as Arc<dyn ConversionProgressCallback>);
    let config = build_config(&cli, progress_cb)?;

    let result = run(&cli, &config).await;
    if let Some(ref spinner) = spinner {
        // Still spinning if the conversion failed half-way.
        spinner.bar.finish_and_clear();
    }
    let stats = result?;

    if cli.json {
        if let Some(ref stats) = stats {
            print_stats_json(stats)?;
        }
    }

    Ok(())
}

/// Run the conversion `cli` asks for. Returns stats unless only HTML was
/// produced.
async fn run(cli: &Cli, config: &ConversionConfig) -> Result<Option<ConversionStats>> {
    // ── HTML only ────────────────────────────────────────────────────────
    if cli.html_only {
        let source = input::read_input(&cli.input, cli.download_timeout)
            .await
            .context("Failed to read input")?;
        let html = render_document(source, config)
            .await
            .context("Failed to build HTML document")?;
        write_output(cli.output.as_deref(), html.as_bytes()).await?;
        return Ok(None);
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let stats = if let Some(ref output_path) = cli.output {
        let stats = convert_to_file(&cli.input, output_path, config)
            .await
            .context("Conversion failed")?;
        if !cli.quiet && !cli.json {
            eprintln!(
                "{}  {} bytes  {}ms  →  {}",
                green("✔"),
                stats.pdf_bytes,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
        stats
    } else {
        let output = convert(&cli.input, config)
            .await
            .context("Conversion failed")?;
        write_output(None, &output.pdf).await?;
        output.stats
    };

    Ok(Some(stats))
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let markdown_options = MarkdownOptions {
        preset: cli.preset,
        breaks: !cli.no_breaks,
        html: cli.html,
        typographer: cli.typographer,
        syntax: cli.syntax.clone(),
        ..Default::default()
    };

    let mut builder = ConversionConfig::builder()
        .cwd(resolve_cwd(cli)?)
        .highlight_theme(cli.theme.clone())
        .paper_format(cli.paper_format.clone())
        .paper_orientation(cli.orientation)
        .paper_border(cli.border.clone())
        .render_delay_ms(cli.render_delay)
        .load_timeout_ms(cli.load_timeout)
        .markdown(markdown_options)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.runnings {
        builder = builder.runnings_path(path);
    }
    if let Some(ref path) = cli.css {
        builder = builder.css_path(path);
    }
    if let Some(ref path) = cli.highlight_css {
        builder = builder.highlight_css_path(path);
    }
    if let Some(ref path) = cli.browser {
        builder = builder.browser_path(path);
    }
    for arg in cli.browser_args.iter().filter(|a| !a.is_empty()) {
        builder = builder.browser_arg(arg.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `--cwd` if given, else the input file's directory, else the process cwd.
fn resolve_cwd(cli: &Cli) -> Result<PathBuf> {
    if let Some(ref dir) = cli.cwd {
        return Ok(dir.clone());
    }
    let here = std::env::current_dir().context("Cannot determine the current directory")?;
    match input::InputSource::parse(&cli.input) {
        input::InputSource::File(path) => Ok(path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| here.join(p))
            .unwrap_or(here)),
        _ => Ok(here),
    }
}

/// Write bytes to `path` or, if `None`, to stdout.
async fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(bytes)
                .await
                .context("Failed to write to stdout")?;
            stdout.flush().await.context("Failed to flush stdout")
        }
    }
}

fn print_stats_json(stats: &ConversionStats) -> Result<()> {
    let json = serde_json::to_string_pretty(stats).context("Failed to serialise stats")?;
    eprintln!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_library() {
        let cli = Cli::parse_from(["md2pdf"]);
        assert_eq!(cli.input, "-");
        assert_eq!(cli.paper_format, PaperFormat::A4);
        assert_eq!(cli.orientation, PaperOrientation::Portrait);
        assert_eq!(cli.border, PaperBorder::Uniform("2cm".into()));
        assert_eq!(cli.load_timeout, 10_000);
        assert!(!cli.no_breaks);
    }

    #[test]
    fn repeatable_flags() {
        let cli = Cli::parse_from([
            "md2pdf",
            "doc.md",
            "--syntax",
            "footnote",
            "--syntax=tasklist,table",
            "--browser-arg=--no-sandbox",
        ]);
        assert_eq!(cli.syntax, vec!["footnote", "tasklist", "table"]);
        assert_eq!(cli.browser_args, vec!["--no-sandbox"]);
    }

    #[test]
    fn cwd_defaults_to_input_dir() {
        let cli = Cli::parse_from(["md2pdf", "docs/guide.md"]);
        let cwd = resolve_cwd(&cli).unwrap();
        assert!(cwd.is_absolute());
        assert!(cwd.ends_with("docs"));
    }

    #[test]
    fn paper_options_parse() {
        let cli = Cli::parse_from([
            "md2pdf",
            "--paper-format",
            "letter",
            "--orientation",
            "landscape",
            "--border",
            "1in 2cm",
        ]);
        assert_eq!(cli.paper_format, PaperFormat::Letter);
        assert_eq!(cli.orientation, PaperOrientation::Landscape);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.paper_border.css_margin(), "1in 2cm 1in 2cm");
    }
}

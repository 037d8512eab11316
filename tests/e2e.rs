//! End-to-end integration tests for edgequake-md2pdf.
//!
//! These tests print the documents in `./test_cases/` through a real
//! headless browser. They are gated behind the `E2E_ENABLED` environment
//! variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! Inside a container running as root, Chromium also needs:
//!   E2E_ENABLED=1 E2E_BROWSER_ARGS=--no-sandbox cargo test --test e2e

use edgequake_md2pdf::{
    convert, convert_reader, convert_to_file, ConversionConfig, ConversionConfigBuilder,
    PaperFormat, PaperOrientation,
};
use futures::StreamExt;
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test if E2E_ENABLED is not set *or* no browser can be found.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        if let Err(e) = browser_locate::find_browser() {
            println!("SKIP — no browser: {e}");
            println!("       Install Chromium or set MD2PDF_BROWSER");
            return;
        }
    }};
}

/// A builder pointed at `test_cases/`, carrying `E2E_BROWSER_ARGS`.
fn builder() -> ConversionConfigBuilder {
    let mut b = ConversionConfig::builder().cwd(test_cases_dir());
    if let Ok(args) = std::env::var("E2E_BROWSER_ARGS") {
        for arg in args.split_whitespace() {
            b = b.browser_arg(arg);
        }
    }
    b
}

/// Assert the bytes look like a complete PDF file.
fn assert_pdf(pdf: &[u8], context: &str) {
    assert!(pdf.len() > 1000, "[{context}] PDF is suspiciously small: {} bytes", pdf.len());
    assert!(pdf.starts_with(b"%PDF-"), "[{context}] missing %PDF- header");
    let tail = &pdf[pdf.len().saturating_sub(1024)..];
    assert!(
        tail.windows(5).any(|w| w == b"%%EOF"),
        "[{context}] missing %%EOF trailer"
    );
}

/// Rough page count: occurrences of `/Type /Page` not followed by `s`.
fn page_count(pdf: &[u8]) -> usize {
    let needle = b"/Type /Page";
    pdf.windows(needle.len() + 1)
        .filter(|w| &w[..needle.len()] == needle && w[needle.len()] != b's')
        .count()
}

// ── Conversion tests ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_convert_sample_defaults() {
    e2e_skip_unless_ready!();

    let config = builder().build().unwrap();
    let input = test_cases_dir().join("sample.md");
    let output = convert(input.to_str().unwrap(), &config)
        .await
        .expect("convert() should succeed");

    assert_pdf(&output.pdf, "defaults");
    assert!(page_count(&output.pdf) >= 1);
    assert_eq!(output.stats.code_blocks, 2);
    assert_eq!(output.stats.highlighted_blocks, 2, "fence tag and shebang");
    assert!(output.html.contains("&lt;span"), "raw HTML escaped by default");

    std::fs::write(output_dir().join("sample_defaults.pdf"), &output.pdf).unwrap();
    println!("Stats: {:?}", output.stats);
}

#[tokio::test]
async fn test_convert_letter_landscape_with_runnings() {
    e2e_skip_unless_ready!();

    let config = builder()
        .paper_format(PaperFormat::Letter)
        .paper_orientation(PaperOrientation::Landscape)
        .paper_border("1in 1.5cm")
        .runnings_path(test_cases_dir().join("runnings.toml"))
        .build()
        .unwrap();

    let out = output_dir().join("sample_letter_landscape.pdf");
    let input = test_cases_dir().join("sample.md");
    let stats = convert_to_file(input.to_str().unwrap(), &out, &config)
        .await
        .expect("convert_to_file() should succeed");

    let pdf = std::fs::read(&out).unwrap();
    assert_pdf(&pdf, "letter landscape");
    assert_eq!(stats.pdf_bytes, pdf.len());
}

#[tokio::test]
async fn test_stream_from_reader() {
    e2e_skip_unless_ready!();

    let config = builder().render_delay_ms(200).build().unwrap();
    let markdown = "# Streamed\n\n".to_string() + &"Lorem ipsum dolor sit amet.\n\n".repeat(400);

    let mut stream = convert_reader(markdown.as_bytes(), &config)
        .await
        .expect("convert_reader() should succeed");
    let mut pdf = Vec::new();
    while let Some(chunk) = stream.next().await {
        pdf.extend(chunk.expect("chunk"));
    }

    assert_pdf(&pdf, "stream");
    assert!(page_count(&pdf) > 1, "400 paragraphs should span several pages");
}

#[tokio::test]
async fn test_convert_nonexistent() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }

    let config = builder().build().unwrap();
    let result = convert("/definitely/not/a/real/file.md", &config).await;
    assert!(result.is_err(), "convert() should return Err for a missing file");
}

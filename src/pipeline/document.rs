//! Document assembly: wrap the HTML body in a printable page.
//!
//! The renderer only sees a single self-contained `.html` file in a temp
//! directory. Everything that shapes the printed page therefore has to be in
//! that file: the stylesheets are inlined, the paper size and margins become
//! an `@page` rule, running content becomes page-margin boxes, and a
//! `<base href>` points relative links back at the configured `cwd`.

use crate::config::ConversionConfig;
use crate::error::Md2PdfError;
use crate::pipeline::markdown::{self, escape_html};
use crate::runnings::Runnings;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use std::path::Path;
use tracing::debug;

/// The built-in document stylesheet.
pub const DEFAULT_CSS: &str = include_str!("../../assets/pdf.css");

/// Stylesheets and templates loaded once per conversion.
#[derive(Debug, Clone, Default)]
pub struct DocumentAssets {
    pub css: String,
    pub highlight_css: String,
    pub runnings: Runnings,
}

/// Load the stylesheets and runnings template named in `config`, falling
/// back to the built-in defaults.
pub async fn load_assets(config: &ConversionConfig) -> Result<DocumentAssets, Md2PdfError> {
    let css = match &config.css_path {
        Some(path) => read_asset("stylesheet", path).await?,
        None => DEFAULT_CSS.to_string(),
    };

    let highlight_css = match &config.highlight_css_path {
        Some(path) => read_asset("highlight stylesheet", path).await?,
        None => markdown::highlight_css(&config.highlight_theme)?,
    };

    let runnings = match &config.runnings_path {
        Some(path) => Runnings::load(path).await?,
        None => Runnings::default(),
    };

    debug!(
        "Loaded assets: {} bytes CSS, {} bytes highlight CSS, runnings={}",
        css.len(),
        highlight_css.len(),
        !runnings.is_empty()
    );

    Ok(DocumentAssets {
        css,
        highlight_css,
        runnings,
    })
}

async fn read_asset(what: &'static str, path: &Path) -> Result<String, Md2PdfError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Md2PdfError::AssetReadFailed {
            what,
            path: path.to_path_buf(),
            source: e,
        })
}

/// Wrap `body` in a complete HTML document ready for printing.
pub fn build_document(
    body: &str,
    assets: &DocumentAssets,
    config: &ConversionConfig,
) -> Result<String, Md2PdfError> {
    let base = base_href(&config.cwd)?;
    let title = document_title(body).unwrap_or_default();

    let mut doc = String::with_capacity(
        body.len() + assets.css.len() + assets.highlight_css.len() + 1024,
    );
    doc.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    doc.push_str(&format!("<base href=\"{}\">\n", escape_html(&base)));
    doc.push_str(&format!("<title>{}</title>\n", escape_html(&title)));
    doc.push_str("<style>\n");
    doc.push_str(&page_css(config));
    doc.push_str(&assets.runnings.to_css());
    doc.push_str("</style>\n<style>\n");
    doc.push_str(&assets.css);
    doc.push_str("\n</style>\n<style>\n");
    doc.push_str(&assets.highlight_css);
    doc.push_str("\n</style>\n</head>\n<body>\n");
    doc.push_str(body);
    doc.push_str("</body>\n</html>\n");

    Ok(doc)
}

/// The `@page` rule carrying paper size, orientation and margins.
pub fn page_css(config: &ConversionConfig) -> String {
    format!(
        "@page {{ size: {}; margin: {}; }}\n",
        config.paper_format.css_size(config.paper_orientation),
        config.paper_border.css_margin()
    )
}

/// `file://` URL of `cwd` with a trailing slash, so relative references
/// resolve inside the directory rather than next to it.
pub fn base_href(cwd: &Path) -> Result<String, Md2PdfError> {
    Url::from_directory_path(cwd)
        .map(|u| u.to_string())
        .map_err(|()| {
            Md2PdfError::InvalidConfig(format!(
                "Working directory '{}' must be an absolute path",
                cwd.display()
            ))
        })
}

static RE_FIRST_H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<h1[^>]*>(.*?)</h1>").unwrap());
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Text of the first `<h1>`, used as the PDF title.
///
/// Entities are left as-is apart from the common five, which are decoded so
/// the title is not escaped twice on the way back into `<title>`.
pub fn document_title(body: &str) -> Option<String> {
    let inner = RE_FIRST_H1.captures(body)?.get(1)?.as_str();
    let text = RE_TAGS.replace_all(inner, "");
    let text = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

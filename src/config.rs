//! Configuration types for Markdown-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Every knob has a documented default so
//! `ConversionConfig::default()` already produces an A4 portrait PDF with 2 cm
//! margins and highlighted code.

use crate::error::Md2PdfError;
use crate::pipeline::markdown::{self, MarkdownPlugin};
use crate::pipeline::render::PdfRenderer;
use crate::pipeline::transform::{Identity, Transform};
use crate::progress::ProgressCallback;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for a Markdown-to-PDF conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_md2pdf::{ConversionConfig, PaperFormat, PaperOrientation};
///
/// let config = ConversionConfig::builder()
///     .paper_format(PaperFormat::Letter)
///     .paper_orientation(PaperOrientation::Landscape)
///     .paper_border("1.5cm")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Base directory for relative resources referenced by the document
    /// (images, stylesheets, links). Default: the process working directory.
    ///
    /// Emitted as the HTML `<base href>`, so `![](img/logo.png)` resolves
    /// against this directory even though the HTML itself lives in a temp dir.
    pub cwd: PathBuf,

    /// TOML file describing running headers and footers. Default: none.
    pub runnings_path: Option<PathBuf>,

    /// Document stylesheet. Default: the built-in `pdf.css`.
    pub css_path: Option<PathBuf>,

    /// Stylesheet for highlighted code. Default: generated from
    /// [`Self::highlight_theme`].
    pub highlight_css_path: Option<PathBuf>,

    /// syntect theme used to generate the default highlight stylesheet.
    /// Default: `InspiredGitHub`.
    pub highlight_theme: String,

    /// Paper size. Default: A4.
    pub paper_format: PaperFormat,

    /// Paper orientation. Default: portrait.
    pub paper_orientation: PaperOrientation,

    /// Page margins. Default: `2cm` on every side.
    pub paper_border: PaperBorder,

    /// Milliseconds the renderer waits after load before printing. Default: 0.
    ///
    /// Raise this when the document pulls in web fonts or remote images that
    /// finish loading after the `load` event.
    pub render_delay_ms: u64,

    /// Page-load timeout handed to the renderer, in milliseconds. Default: 10 000.
    pub load_timeout_ms: u64,

    /// Markdown engine options.
    pub markdown: MarkdownOptions,

    /// Hook applied to the Markdown text before parsing. Default: identity.
    pub preprocess_markdown: Arc<dyn Transform>,

    /// Hook applied to the HTML body before it is wrapped in a document.
    /// Default: identity.
    pub preprocess_html: Arc<dyn Transform>,

    /// Explicit browser executable. If None, auto-detected.
    pub browser_path: Option<PathBuf>,

    /// Extra switches passed to the browser (e.g. `--no-sandbox` when
    /// running as root inside a container). Default: none.
    pub browser_args: Vec<String>,

    /// Pre-constructed renderer. Takes precedence over `browser_path`.
    pub renderer: Option<Arc<dyn PdfRenderer>>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Stage observer. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            runnings_path: None,
            css_path: None,
            highlight_css_path: None,
            highlight_theme: markdown::DEFAULT_THEME.to_string(),
            paper_format: PaperFormat::default(),
            paper_orientation: PaperOrientation::default(),
            paper_border: PaperBorder::default(),
            render_delay_ms: 0,
            load_timeout_ms: 10_000,
            markdown: MarkdownOptions::default(),
            preprocess_markdown: Arc::new(Identity),
            preprocess_html: Arc::new(Identity),
            browser_path: None,
            browser_args: Vec::new(),
            renderer: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("cwd", &self.cwd)
            .field("runnings_path", &self.runnings_path)
            .field("css_path", &self.css_path)
            .field("highlight_css_path", &self.highlight_css_path)
            .field("highlight_theme", &self.highlight_theme)
            .field("paper_format", &self.paper_format)
            .field("paper_orientation", &self.paper_orientation)
            .field("paper_border", &self.paper_border)
            .field("render_delay_ms", &self.render_delay_ms)
            .field("load_timeout_ms", &self.load_timeout_ms)
            .field("markdown", &self.markdown)
            .field("browser_path", &self.browser_path)
            .field("browser_args", &self.browser_args)
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn PdfRenderer>"))
            .field("download_timeout_secs", &self.download_timeout_secs)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cwd = dir.into();
        self
    }

    pub fn runnings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.runnings_path = Some(path.into());
        self
    }

    pub fn css_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.css_path = Some(path.into());
        self
    }

    pub fn highlight_css_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.highlight_css_path = Some(path.into());
        self
    }

    pub fn highlight_theme(mut self, name: impl Into<String>) -> Self {
        self.config.highlight_theme = name.into();
        self
    }

    pub fn paper_format(mut self, format: PaperFormat) -> Self {
        self.config.paper_format = format;
        self
    }

    pub fn paper_orientation(mut self, orientation: PaperOrientation) -> Self {
        self.config.paper_orientation = orientation;
        self
    }

    pub fn paper_border(mut self, border: impl Into<PaperBorder>) -> Self {
        self.config.paper_border = border.into();
        self
    }

    pub fn render_delay_ms(mut self, ms: u64) -> Self {
        self.config.render_delay_ms = ms;
        self
    }

    pub fn load_timeout_ms(mut self, ms: u64) -> Self {
        self.config.load_timeout_ms = ms;
        self
    }

    pub fn markdown(mut self, options: MarkdownOptions) -> Self {
        self.config.markdown = options;
        self
    }

    pub fn preprocess_markdown(mut self, hook: Arc<dyn Transform>) -> Self {
        self.config.preprocess_markdown = hook;
        self
    }

    pub fn preprocess_html(mut self, hook: Arc<dyn Transform>) -> Self {
        self.config.preprocess_html = hook;
        self
    }

    pub fn browser_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.browser_path = Some(path.into());
        self
    }

    pub fn browser_arg(mut self, arg: impl Into<String>) -> Self {
        self.config.browser_args.push(arg.into());
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn PdfRenderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// `cwd` is made absolute here so the `<base href>` it becomes is valid
    /// no matter where the renderer is started from.
    pub fn build(mut self) -> Result<ConversionConfig, Md2PdfError> {
        let c = &mut self.config;

        if c.load_timeout_ms == 0 {
            return Err(Md2PdfError::InvalidConfig(
                "Load timeout must be ≥ 1ms".into(),
            ));
        }

        c.paper_border.validate()?;
        c.paper_format.validate()?;

        if c.highlight_css_path.is_none() && !markdown::theme_exists(&c.highlight_theme) {
            return Err(Md2PdfError::UnknownTheme {
                name: c.highlight_theme.clone(),
                available: markdown::theme_names().join(", "),
            });
        }

        if c.cwd.is_relative() {
            let base = std::env::current_dir().map_err(|e| {
                Md2PdfError::InvalidConfig(format!("Cannot resolve working directory: {e}"))
            })?;
            c.cwd = base.join(&c.cwd);
        }

        Ok(self.config)
    }
}

// ── CSS lengths ──────────────────────────────────────────────────────────

static RE_CSS_LENGTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0|\d+(\.\d+)?(mm|cm|in|pt|pc|px))$").unwrap());

/// `WIDTHxHEIGHT`: the separator is the `x` right after the width's unit.
static RE_CUSTOM_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0|\d+(?:\.\d+)?(?:mm|cm|in|pt|pc|px))x(.+)$").unwrap());

/// Returns `true` if `s` is an absolute CSS length such as `2cm` or `0.5in`.
pub fn is_css_length(s: &str) -> bool {
    RE_CSS_LENGTH.is_match(s)
}

fn check_length(what: &str, value: &str) -> Result<(), Md2PdfError> {
    if is_css_length(value) {
        Ok(())
    } else {
        Err(Md2PdfError::InvalidConfig(format!(
            "{what} must be a CSS length like '2cm', '10mm' or '0.5in', got '{value}'"
        )))
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Paper size of every page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaperFormat {
    A3,
    /// 210 × 297 mm (default).
    #[default]
    A4,
    A5,
    Legal,
    Letter,
    /// 11 × 17 in.
    Tabloid,
    /// Explicit width and height as CSS lengths, given in portrait order.
    Custom { width: String, height: String },
}

impl PaperFormat {
    /// Render the value of the CSS `@page { size: … }` property.
    ///
    /// Named formats map to CSS keywords; landscape custom sizes swap width
    /// and height.
    pub fn css_size(&self, orientation: PaperOrientation) -> String {
        let keyword = match self {
            PaperFormat::A3 => "A3",
            PaperFormat::A4 => "A4",
            PaperFormat::A5 => "A5",
            PaperFormat::Legal => "legal",
            PaperFormat::Letter => "letter",
            PaperFormat::Tabloid => {
                return match orientation {
                    PaperOrientation::Portrait => "11in 17in".to_string(),
                    PaperOrientation::Landscape => "17in 11in".to_string(),
                }
            }
            PaperFormat::Custom { width, height } => {
                return match orientation {
                    PaperOrientation::Portrait => format!("{width} {height}"),
                    PaperOrientation::Landscape => format!("{height} {width}"),
                }
            }
        };
        format!("{keyword} {orientation}")
    }

    fn validate(&self) -> Result<(), Md2PdfError> {
        if let PaperFormat::Custom { width, height } = self {
            check_length("Paper width", width)?;
            check_length("Paper height", height)?;
        }
        Ok(())
    }
}

impl FromStr for PaperFormat {
    type Err = Md2PdfError;

    /// Accepts a format name (`a4`, `Letter`, …) or `WIDTHxHEIGHT`
    /// (`210mmx99mm`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let format = match lower.as_str() {
            "a3" => PaperFormat::A3,
            "a4" => PaperFormat::A4,
            "a5" => PaperFormat::A5,
            "legal" => PaperFormat::Legal,
            "letter" => PaperFormat::Letter,
            "tabloid" => PaperFormat::Tabloid,
            other => {
                let caps = RE_CUSTOM_SIZE.captures(other).ok_or_else(|| {
                    Md2PdfError::InvalidConfig(format!(
                        "Unknown paper format '{s}' (expected A3, A4, A5, Legal, Letter, Tabloid or WIDTHxHEIGHT)"
                    ))
                })?;
                PaperFormat::Custom {
                    width: caps[1].to_string(),
                    height: caps[2].to_string(),
                }
            }
        };
        format.validate()?;
        Ok(format)
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaperOrientation {
    #[default]
    Portrait,
    Landscape,
}

impl fmt::Display for PaperOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaperOrientation::Portrait => f.write_str("portrait"),
            PaperOrientation::Landscape => f.write_str("landscape"),
        }
    }
}

impl FromStr for PaperOrientation {
    type Err = Md2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "portrait" => Ok(PaperOrientation::Portrait),
            "landscape" => Ok(PaperOrientation::Landscape),
            _ => Err(Md2PdfError::InvalidConfig(format!(
                "Unknown orientation '{s}' (expected portrait or landscape)"
            ))),
        }
    }
}

/// Page margins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperBorder {
    /// Same length on all four sides.
    Uniform(String),
    /// One length per side.
    Sides {
        top: String,
        right: String,
        bottom: String,
        left: String,
    },
}

impl Default for PaperBorder {
    fn default() -> Self {
        PaperBorder::Uniform("2cm".to_string())
    }
}

impl From<&str> for PaperBorder {
    fn from(s: &str) -> Self {
        PaperBorder::Uniform(s.to_string())
    }
}

impl From<String> for PaperBorder {
    fn from(s: String) -> Self {
        PaperBorder::Uniform(s)
    }
}

impl PaperBorder {
    /// Render the value of the CSS `@page { margin: … }` property.
    pub fn css_margin(&self) -> String {
        match self {
            PaperBorder::Uniform(len) => len.clone(),
            PaperBorder::Sides {
                top,
                right,
                bottom,
                left,
            } => format!("{top} {right} {bottom} {left}"),
        }
    }

    fn validate(&self) -> Result<(), Md2PdfError> {
        match self {
            PaperBorder::Uniform(len) => check_length("Paper border", len),
            PaperBorder::Sides {
                top,
                right,
                bottom,
                left,
            } => {
                for (side, len) in [("top", top), ("right", right), ("bottom", bottom), ("left", left)] {
                    check_length(&format!("Paper border ({side})"), len)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for PaperBorder {
    type Err = Md2PdfError;

    /// Parses CSS margin shorthand with one, two or four lengths.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        let border = match parts.as_slice() {
            [all] => PaperBorder::Uniform(all.to_string()),
            [vertical, horizontal] => PaperBorder::Sides {
                top: vertical.to_string(),
                right: horizontal.to_string(),
                bottom: vertical.to_string(),
                left: horizontal.to_string(),
            },
            [top, right, bottom, left] => PaperBorder::Sides {
                top: top.to_string(),
                right: right.to_string(),
                bottom: bottom.to_string(),
                left: left.to_string(),
            },
            _ => {
                return Err(Md2PdfError::InvalidConfig(format!(
                    "Paper border '{s}' must have 1, 2 or 4 lengths"
                )))
            }
        };
        border.validate()?;
        Ok(border)
    }
}

/// Which family of Markdown extensions is switched on before the
/// individually named [`MarkdownOptions::syntax`] rules are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarkdownPreset {
    /// Tables and strikethrough (default).
    #[default]
    Default,
    /// Strict CommonMark: no extensions.
    Commonmark,
    /// Every extension the parser offers.
    Full,
}

impl FromStr for MarkdownPreset {
    type Err = Md2PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(MarkdownPreset::Default),
            "commonmark" => Ok(MarkdownPreset::Commonmark),
            "full" => Ok(MarkdownPreset::Full),
            _ => Err(Md2PdfError::InvalidConfig(format!(
                "Unknown Markdown preset '{s}' (expected default, commonmark or full)"
            ))),
        }
    }
}

/// Options for the Markdown engine.
#[derive(Clone)]
pub struct MarkdownOptions {
    /// Extension preset. Default: [`MarkdownPreset::Default`].
    pub preset: MarkdownPreset,

    /// Render soft line breaks as `<br />`. Default: true.
    pub breaks: bool,

    /// Pass raw HTML in the source through. Default: false (escaped).
    pub html: bool,

    /// Smart quotes and dashes. Default: false.
    pub typographer: bool,

    /// Class prefix of `<code>` inside fenced blocks. Default: `language-`.
    pub lang_prefix: String,

    /// Extra extension rules enabled by name (`footnote`, `tasklist`, …).
    /// Unknown names are ignored with a warning.
    pub syntax: Vec<String>,

    /// Event-rewriting plugins, applied in order.
    pub plugins: Vec<Arc<dyn MarkdownPlugin>>,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            preset: MarkdownPreset::default(),
            breaks: true,
            html: false,
            typographer: false,
            lang_prefix: "language-".to_string(),
            syntax: Vec::new(),
            plugins: Vec::new(),
        }
    }
}

impl fmt::Debug for MarkdownOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkdownOptions")
            .field("preset", &self.preset)
            .field("breaks", &self.breaks)
            .field("html", &self.html)
            .field("typographer", &self.typographer)
            .field("lang_prefix", &self.lang_prefix)
            .field("syntax", &self.syntax)
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.paper_format, PaperFormat::A4);
        assert_eq!(c.paper_orientation, PaperOrientation::Portrait);
        assert_eq!(c.paper_border.css_margin(), "2cm");
        assert_eq!(c.load_timeout_ms, 10_000);
        assert_eq!(c.render_delay_ms, 0);
        assert!(c.markdown.breaks);
        assert!(!c.markdown.html);
        assert_eq!(c.markdown.preset, MarkdownPreset::Default);
    }

    #[test]
    fn build_makes_cwd_absolute() {
        let c = ConversionConfig::builder().cwd("docs").build().unwrap();
        assert!(c.cwd.is_absolute());
        assert!(c.cwd.ends_with("docs"));
    }

    #[test]
    fn build_rejects_bad_border() {
        let err = ConversionConfig::builder()
            .paper_border("two centimetres")
            .build()
            .unwrap_err();
        assert!(matches!(err, Md2PdfError::InvalidConfig(_)));
    }

    #[test]
    fn build_rejects_zero_timeout() {
        assert!(ConversionConfig::builder().load_timeout_ms(0).build().is_err());
    }

    #[test]
    fn build_rejects_unknown_theme() {
        let err = ConversionConfig::builder()
            .highlight_theme("Nope")
            .build()
            .unwrap_err();
        assert!(matches!(err, Md2PdfError::UnknownTheme { .. }));
    }

    #[test]
    fn unknown_theme_is_fine_with_explicit_highlight_css() {
        ConversionConfig::builder()
            .highlight_theme("Nope")
            .highlight_css_path("hl.css")
            .build()
            .unwrap();
    }

    #[test]
    fn css_lengths() {
        for ok in ["0", "2cm", "10mm", "0.5in", "12pt", "1pc", "96px"] {
            assert!(is_css_length(ok), "{ok}");
        }
        for bad in ["", "2", "cm", "2 cm", "-1cm", "2em", "1.cm"] {
            assert!(!is_css_length(bad), "{bad}");
        }
    }

    #[test]
    fn css_size_named_and_custom() {
        use PaperOrientation::*;
        assert_eq!(PaperFormat::A4.css_size(Portrait), "A4 portrait");
        assert_eq!(PaperFormat::Letter.css_size(Landscape), "letter landscape");
        assert_eq!(PaperFormat::Tabloid.css_size(Landscape), "17in 11in");
        let custom = PaperFormat::Custom {
            width: "100mm".into(),
            height: "150mm".into(),
        };
        assert_eq!(custom.css_size(Portrait), "100mm 150mm");
        assert_eq!(custom.css_size(Landscape), "150mm 100mm");
    }

    #[test]
    fn paper_format_from_str() {
        assert_eq!("a5".parse::<PaperFormat>().unwrap(), PaperFormat::A5);
        assert_eq!("Legal".parse::<PaperFormat>().unwrap(), PaperFormat::Legal);
        assert_eq!(
            "210mmx99mm".parse::<PaperFormat>().unwrap(),
            PaperFormat::Custom {
                width: "210mm".into(),
                height: "99mm".into()
            }
        );
        assert_eq!(
            "100pxx200px".parse::<PaperFormat>().unwrap(),
            PaperFormat::Custom {
                width: "100px".into(),
                height: "200px".into()
            }
        );
        assert_eq!(
            "8.5inx11in".parse::<PaperFormat>().unwrap(),
            PaperFormat::Custom {
                width: "8.5in".into(),
                height: "11in".into()
            }
        );
        assert!("b5".parse::<PaperFormat>().is_err());
        assert!("10x20".parse::<PaperFormat>().is_err());
        assert!("100pxx200".parse::<PaperFormat>().is_err());
    }

    #[test]
    fn paper_border_shorthand() {
        assert_eq!(
            "1cm".parse::<PaperBorder>().unwrap(),
            PaperBorder::Uniform("1cm".into())
        );
        let two = "1cm 2cm".parse::<PaperBorder>().unwrap();
        assert_eq!(two.css_margin(), "1cm 2cm 1cm 2cm");
        let four = "1cm 2cm 3cm 4cm".parse::<PaperBorder>().unwrap();
        assert_eq!(four.css_margin(), "1cm 2cm 3cm 4cm");
        assert!("1cm 2cm 3cm".parse::<PaperBorder>().is_err());
        assert!("1cm wide".parse::<PaperBorder>().is_err());
    }

    #[test]
    fn orientation_and_preset_from_str() {
        assert_eq!(
            "LANDSCAPE".parse::<PaperOrientation>().unwrap(),
            PaperOrientation::Landscape
        );
        assert!("sideways".parse::<PaperOrientation>().is_err());
        assert_eq!(
            "commonmark".parse::<MarkdownPreset>().unwrap(),
            MarkdownPreset::Commonmark
        );
        assert!("gfm".parse::<MarkdownPreset>().is_err());
    }
}

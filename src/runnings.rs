//! Running content: headers and footers repeated on every page.
//!
//! A runnings template is a small TOML file:
//!
//! ```toml
//! skip_first_page = true
//!
//! [header]
//! left  = "Quarterly report"
//! right = "{page} / {pages}"
//!
//! [footer]
//! center = "Page {page} of {pages}"
//! style  = "font-size: 8pt; color: #999;"
//! ```
//!
//! Each band has up to three slots (`left`, `center`, `right`). `{page}` and
//! `{pages}` are replaced by the current page number and the page count.
//!
//! The template is compiled to CSS page-margin boxes (`@top-left`,
//! `@bottom-center`, …) with `counter(page)` / `counter(pages)`, which the
//! browser fills in at print time. No second rendering pass is needed.

use crate::error::Md2PdfError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Style applied to a band when the template does not give one.
pub const DEFAULT_BAND_STYLE: &str = "font-size: 9pt; color: #555;";

/// A parsed runnings template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Runnings {
    /// Suppress running content on the first page (title pages).
    #[serde(default)]
    pub skip_first_page: bool,
    /// Content of the top margin.
    pub header: Option<RunningBand>,
    /// Content of the bottom margin.
    pub footer: Option<RunningBand>,
}

/// One horizontal band (header or footer).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunningBand {
    pub left: Option<String>,
    pub center: Option<String>,
    pub right: Option<String>,
    /// Extra CSS declarations for every box of this band.
    pub style: Option<String>,
}

impl RunningBand {
    fn slots(&self) -> [(&'static str, Option<&str>); 3] {
        [
            ("left", self.left.as_deref()),
            ("center", self.center.as_deref()),
            ("right", self.right.as_deref()),
        ]
    }
}

impl Runnings {
    /// Parse a template from TOML. `origin` is only used in error messages.
    pub fn from_toml_str(source: &str, origin: &Path) -> Result<Self, Md2PdfError> {
        let invalid = |reason: String| Md2PdfError::InvalidRunnings {
            path: origin.to_path_buf(),
            reason,
        };
        let runnings: Self = toml::from_str(source).map_err(|e| invalid(e.to_string()))?;

        // Styles are raw declarations and cannot be escaped like content.
        for (name, band) in [("header", &runnings.header), ("footer", &runnings.footer)] {
            if let Some(style) = band.as_ref().and_then(|b| b.style.as_deref()) {
                if style.contains('<') {
                    return Err(invalid(format!("{name}.style must not contain '<'")));
                }
            }
        }
        Ok(runnings)
    }

    /// Read and parse a template file.
    pub async fn load(path: &Path) -> Result<Self, Md2PdfError> {
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Md2PdfError::AssetReadFailed {
                what: "runnings template",
                path: path.to_path_buf(),
                source: e,
            })?;
        Self::from_toml_str(&source, path)
    }

    /// Returns `true` if no slot has any content.
    pub fn is_empty(&self) -> bool {
        self.margin_boxes().next().is_none()
    }

    /// Compile the template to CSS `@page` margin-box rules.
    ///
    /// Returns an empty string for an empty template.
    pub fn to_css(&self) -> String {
        let boxes: Vec<(String, String, &str)> = self.margin_boxes().collect();
        if boxes.is_empty() {
            return String::new();
        }

        let mut css = String::from("@page {\n");
        for (name, content, style) in &boxes {
            css.push_str(&format!("  @{name} {{ content: {content}; {style} }}\n"));
        }
        css.push_str("}\n");

        if self.skip_first_page {
            css.push_str("@page :first {\n");
            for (name, _, _) in &boxes {
                css.push_str(&format!("  @{name} {{ content: none; }}\n"));
            }
            css.push_str("}\n");
        }

        css
    }

    /// `(box name, CSS content value, style)` for every non-empty slot.
    fn margin_boxes(&self) -> impl Iterator<Item = (String, String, &str)> {
        [("top", self.header.as_ref()), ("bottom", self.footer.as_ref())]
            .into_iter()
            .filter_map(|(edge, band)| band.map(|b| (edge, b)))
            .flat_map(|(edge, band)| {
                let style = band.style.as_deref().unwrap_or(DEFAULT_BAND_STYLE);
                band.slots()
                    .into_iter()
                    .filter_map(move |(slot, text)| match text {
                        Some(t) if !t.is_empty() => {
                            Some((format!("{edge}-{slot}"), css_content(t), style))
                        }
                        _ => None,
                    })
            })
    }
}

static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(page|pages)\}").unwrap());

/// Turn `"Page {page} of {pages}"` into
/// `"Page " counter(page) " of " counter(pages)`.
pub fn css_content(template: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut last = 0;

    for caps in RE_PLACEHOLDER.captures_iter(template) {
        let Some(m) = caps.get(0) else { continue };
        if m.start() > last {
            parts.push(css_string(&template[last..m.start()]));
        }
        parts.push(format!("counter({})", &caps[1]));
        last = m.end();
    }
    if last < template.len() {
        parts.push(css_string(&template[last..]));
    }

    parts.join(" ")
}

/// Quote `s` as a CSS string literal.
///
/// The CSS ends up inside an HTML `<style>` element, so `<` and `>` are
/// written as hex escapes and can never close it.
fn css_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\A "),
            '<' => out.push_str("\\3C "),
            '>' => out.push_str("\\3E "),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(s: &str) -> Runnings {
        Runnings::from_toml_str(s, Path::new("runnings.toml")).unwrap()
    }

    #[test]
    fn css_content_placeholders() {
        assert_eq!(
            css_content("Page {page} of {pages}"),
            r#""Page " counter(page) " of " counter(pages)"#
        );
        assert_eq!(css_content("{page}"), "counter(page)");
        assert_eq!(css_content("plain"), r#""plain""#);
        assert_eq!(css_content("{chapter}"), r#""{chapter}""#);
    }

    #[test]
    fn css_string_escapes() {
        assert_eq!(css_string(r#"say "hi" \o/"#), r#""say \"hi\" \\o/""#);
        assert_eq!(css_string("a\nb"), "\"a\\A b\"");
        assert_eq!(css_string("<b>"), r#""\3C b\3E ""#);
    }

    #[test]
    fn markup_cannot_close_the_style_element() {
        let r = parse("[header]\nleft = \"a </style><p>LEAK</p>\"\n");
        let css = r.to_css();
        assert!(!css.contains('<'), "got: {css}");
        assert!(!css.contains('>'), "got: {css}");
        assert!(css.contains(r#"content: "a \3C /style\3E \3C p\3E LEAK"#));
    }

    #[test]
    fn header_and_footer_to_css() {
        let r = parse(
            r#"
[header]
left = "Report"

[footer]
center = "{page} / {pages}"
style = "font-size: 8pt;"
"#,
        );
        assert_eq!(
            r.to_css(),
            format!(
                "@page {{\n  @top-left {{ content: \"Report\"; {DEFAULT_BAND_STYLE} }}\n  \
@bottom-center {{ content: counter(page) \" / \" counter(pages); font-size: 8pt; }}\n}}\n"
            )
        );
    }

    #[test]
    fn skip_first_page_blanks_boxes() {
        let r = parse("skip_first_page = true\n[footer]\nright = \"{page}\"\n");
        let css = r.to_css();
        assert!(css.contains("@page :first"));
        assert!(css.contains("@bottom-right { content: none; }"));
    }

    #[test]
    fn empty_template_is_empty_css() {
        assert!(Runnings::default().is_empty());
        assert_eq!(Runnings::default().to_css(), "");
        let blank = parse("[header]\nleft = \"\"\n");
        assert!(blank.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Runnings::from_toml_str("[header]\nmiddle = \"x\"\n", Path::new("r.toml"))
            .unwrap_err();
        assert!(matches!(err, Md2PdfError::InvalidRunnings { .. }));
        assert!(err.to_string().contains("r.toml"));
    }

    #[test]
    fn markup_in_style_is_rejected() {
        let err = Runnings::from_toml_str(
            "[footer]\ncenter = \"x\"\nstyle = \"color: red;</style>\"\n",
            Path::new("r.toml"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("footer.style"), "got: {err}");
    }

    #[tokio::test]
    async fn load_missing_file() {
        let err = Runnings::load(Path::new("/definitely/not/here.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, Md2PdfError::AssetReadFailed { .. }));
    }
}

//! Markdown → HTML with syntax-highlighted code blocks.
//!
//! Parsing is delegated entirely to `pulldown-cmark`; highlighting to
//! `syntect`. This module only wires the two together: it walks the parser's
//! event stream, swaps every code block for a pre-highlighted HTML event, and
//! applies the [`MarkdownOptions`] switches (`breaks`, `html`) as event
//! rewrites.
//!
//! Highlighted code uses CSS classes (`hl-` prefixed scope names) rather than
//! inline colours, so the look is controlled by the highlight stylesheet and
//! can be swapped without re-rendering. [`highlight_css`] generates that
//! stylesheet from any bundled syntect theme.

use crate::config::{MarkdownOptions, MarkdownPreset};
use crate::error::Md2PdfError;
use once_cell::sync::Lazy;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use tracing::{debug, warn};

/// Theme used for the generated highlight stylesheet when none is chosen.
pub const DEFAULT_THEME: &str = "InspiredGitHub";

const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hl-" };

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

/// Rewrites parser events before they are turned into HTML.
///
/// The Rust counterpart of a Markdown-engine plugin: return `Some(event)`
/// (possibly a different one) to keep it, `None` to drop it.
///
/// Code-block start and end events are not passed to plugins; the text
/// inside a code block is.
///
/// ```rust
/// use edgequake_md2pdf::pipeline::markdown::MarkdownPlugin;
/// use pulldown_cmark::Event;
///
/// /// Removes every horizontal rule.
/// struct NoRules;
///
/// impl MarkdownPlugin for NoRules {
///     fn rewrite<'a>(&self, event: Event<'a>) -> Option<Event<'a>> {
///         match event {
///             Event::Rule => None,
///             other => Some(other),
///         }
///     }
/// }
/// ```
pub trait MarkdownPlugin: Send + Sync {
    fn rewrite<'a>(&self, event: Event<'a>) -> Option<Event<'a>>;
}

/// Output of [`render_html`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedHtml {
    /// The HTML body fragment.
    pub html: String,
    /// Number of code blocks (fenced and indented).
    pub code_blocks: usize,
    /// Code blocks that received syntax highlighting.
    pub highlighted_blocks: usize,
}

/// Render Markdown to an HTML body fragment.
///
/// Infallible: Markdown has no syntax errors, and a highlighter failure
/// falls back to escaped plain code for that block.
pub fn render_html(markdown: &str, options: &MarkdownOptions) -> RenderedHtml {
    let parser = Parser::new_ext(markdown, parser_options(options));

    let mut events: Vec<Event<'_>> = Vec::new();
    let mut code: Option<(Option<String>, String)> = None;
    let mut code_blocks = 0;
    let mut highlighted_blocks = 0;

    for event in parser {
        let event = match event {
            e @ (Event::Start(Tag::CodeBlock(_)) | Event::End(TagEnd::CodeBlock)) => e,
            e => match apply_plugins(&options.plugins, e) {
                Some(e) => e,
                None => continue,
            },
        };

        // Inside a code block: buffer text until the block closes.
        if let Some((lang, buf)) = code.as_mut() {
            match event {
                Event::Text(text) => buf.push_str(&text),
                Event::End(TagEnd::CodeBlock) => {
                    let block = highlight_block(buf, lang.as_deref(), &options.lang_prefix);
                    code_blocks += 1;
                    if block.highlighted {
                        highlighted_blocks += 1;
                    }
                    events.push(Event::Html(CowStr::from(block.html)));
                    code = None;
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => fence_language(&info),
                    CodeBlockKind::Indented => None,
                };
                code = Some((lang, String::new()));
            }
            Event::SoftBreak if options.breaks => events.push(Event::HardBreak),
            Event::Html(raw) if !options.html => events.push(Event::Text(raw)),
            Event::InlineHtml(raw) if !options.html => events.push(Event::Text(raw)),
            other => events.push(other),
        }
    }

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());

    debug!(
        "Rendered {} bytes of HTML ({} code blocks, {} highlighted)",
        out.len(),
        code_blocks,
        highlighted_blocks
    );

    RenderedHtml {
        html: out,
        code_blocks,
        highlighted_blocks,
    }
}

/// Generate the highlight stylesheet for a bundled syntect theme.
pub fn highlight_css(theme_name: &str) -> Result<String, Md2PdfError> {
    let theme = THEME_SET
        .themes
        .get(theme_name)
        .ok_or_else(|| Md2PdfError::UnknownTheme {
            name: theme_name.to_string(),
            available: theme_names().join(", "),
        })?;
    css_for_theme_with_class_style(theme, CLASS_STYLE)
        .map_err(|e| Md2PdfError::Internal(format!("highlight CSS for '{theme_name}': {e}")))
}

/// Names of the bundled highlight themes, sorted.
pub fn theme_names() -> Vec<String> {
    THEME_SET.themes.keys().cloned().collect()
}

/// Returns `true` if `name` is a bundled highlight theme.
pub fn theme_exists(name: &str) -> bool {
    THEME_SET.themes.contains_key(name)
}

// ── Parser options ───────────────────────────────────────────────────────

/// Translate [`MarkdownOptions`] into `pulldown-cmark` extension flags.
pub fn parser_options(options: &MarkdownOptions) -> Options {
    let mut flags = match options.preset {
        MarkdownPreset::Commonmark => Options::empty(),
        MarkdownPreset::Default => Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH,
        MarkdownPreset::Full => Options::all(),
    };

    if options.typographer {
        flags |= Options::ENABLE_SMART_PUNCTUATION;
    }

    for rule in &options.syntax {
        match syntax_rule(rule) {
            Some(flag) => flags |= flag,
            None => warn!("Ignoring unknown Markdown syntax rule '{}'", rule),
        }
    }

    flags
}

fn syntax_rule(name: &str) -> Option<Options> {
    let flag = match name.trim().to_lowercase().as_str() {
        "table" | "tables" => Options::ENABLE_TABLES,
        "strikethrough" | "del" => Options::ENABLE_STRIKETHROUGH,
        "footnote" | "footnotes" => Options::ENABLE_FOOTNOTES,
        "tasklist" | "tasklists" => Options::ENABLE_TASKLISTS,
        "smartypants" | "typographer" | "smart_punctuation" => Options::ENABLE_SMART_PUNCTUATION,
        "heading_attributes" => Options::ENABLE_HEADING_ATTRIBUTES,
        "math" => Options::ENABLE_MATH,
        "gfm" => Options::ENABLE_GFM,
        "metadata_blocks" => {
            Options::ENABLE_YAML_STYLE_METADATA_BLOCKS
                | Options::ENABLE_PLUSES_DELIMITED_METADATA_BLOCKS
        }
        _ => return None,
    };
    Some(flag)
}

fn apply_plugins<'a>(
    plugins: &[std::sync::Arc<dyn MarkdownPlugin>],
    event: Event<'a>,
) -> Option<Event<'a>> {
    plugins
        .iter()
        .try_fold(event, |event, plugin| plugin.rewrite(event))
}

// ── Code blocks ──────────────────────────────────────────────────────────

struct HighlightedBlock {
    html: String,
    highlighted: bool,
}

/// First word of a fence info string: "rust,ignore" and "rust title=x" → "rust".
fn fence_language(info: &str) -> Option<String> {
    info.split(|c: char| c.is_whitespace() || c == ',' || c == '{')
        .find(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Pick a syntax: the fence language if known, else first-line detection
/// (shebangs, modelines, `<?xml`).
fn find_syntax<'s>(ss: &'s SyntaxSet, lang: Option<&str>, code: &str) -> Option<&'s SyntaxReference> {
    if let Some(lang) = lang {
        if let Some(syntax) = ss.find_syntax_by_token(lang) {
            return Some(syntax);
        }
    }
    code.lines()
        .next()
        .and_then(|first| ss.find_syntax_by_first_line(first))
}

fn highlight_block(code: &str, lang: Option<&str>, lang_prefix: &str) -> HighlightedBlock {
    let class_attr = match lang {
        Some(l) => format!(" class=\"{}{}\"", escape_html(lang_prefix), escape_html(l)),
        None => String::new(),
    };

    let ss: &SyntaxSet = &SYNTAX_SET;
    let (inner, highlighted) = match find_syntax(ss, lang, code) {
        Some(syntax) => match highlight_lines(ss, syntax, code) {
            Ok(spans) => (spans, true),
            Err(e) => {
                warn!("Highlighting as {} failed, using plain text: {}", syntax.name, e);
                (escape_html(code), false)
            }
        },
        None => (escape_html(code), false),
    };

    HighlightedBlock {
        html: format!("<pre class=\"hl-code\"><code{class_attr}>{inner}</code></pre>\n"),
        highlighted,
    }
}

fn highlight_lines(
    ss: &SyntaxSet,
    syntax: &SyntaxReference,
    code: &str,
) -> Result<String, syntect::Error> {
    let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, ss, CLASS_STYLE);
    for line in LinesWithEndings::from(code) {
        generator.parse_html_for_line_which_includes_newline(line)?;
    }
    Ok(generator.finalize())
}

/// Minimal HTML escaping for text and attribute values.
pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn render(md: &str) -> RenderedHtml {
        render_html(md, &MarkdownOptions::default())
    }

    #[test]
    fn soft_breaks_become_hard_breaks_by_default() {
        assert_eq!(render("one\ntwo").html, "<p>one<br />\ntwo</p>\n");
    }

    #[test]
    fn soft_breaks_kept_when_breaks_off() {
        let opts = MarkdownOptions {
            breaks: false,
            ..Default::default()
        };
        assert_eq!(render_html("one\ntwo", &opts).html, "<p>one\ntwo</p>\n");
    }

    #[test]
    fn raw_html_escaped_by_default() {
        let out = render("hello <b>world</b>").html;
        assert!(out.contains("&lt;b&gt;world&lt;/b&gt;"), "got: {out}");
    }

    #[test]
    fn raw_html_passes_through_when_enabled() {
        let opts = MarkdownOptions {
            html: true,
            ..Default::default()
        };
        let out = render_html("hello <b>world</b>", &opts).html;
        assert!(out.contains("<b>world</b>"), "got: {out}");
    }

    #[test]
    fn known_language_is_highlighted() {
        let out = render("```rust\nfn main() {}\n```\n");
        assert_eq!(out.code_blocks, 1);
        assert_eq!(out.highlighted_blocks, 1);
        assert!(out.html.contains("<pre class=\"hl-code\"><code class=\"language-rust\">"));
        assert!(out.html.contains("<span class=\"hl-"), "got: {}", out.html);
        assert!(out.html.contains("main"));
    }

    #[test]
    fn info_string_attributes_are_ignored() {
        let out = render("```rust,ignore\nlet x = 1;\n```\n");
        assert!(out.html.contains("class=\"language-rust\""), "got: {}", out.html);
        assert_eq!(out.highlighted_blocks, 1);
    }

    #[test]
    fn unknown_language_falls_back_to_escaped_text() {
        let out = render("```klingon\nif a < b && c\n```\n");
        assert_eq!(out.code_blocks, 1);
        assert_eq!(out.highlighted_blocks, 0);
        assert!(out.html.contains("if a &lt; b &amp;&amp; c"), "got: {}", out.html);
        assert!(out.html.contains("class=\"language-klingon\""));
    }

    #[test]
    fn shebang_is_detected_without_fence_language() {
        let out = render("```\n#!/bin/bash\necho hi\n```\n");
        assert_eq!(out.highlighted_blocks, 1, "got: {}", out.html);
        assert!(out.html.contains("<pre class=\"hl-code\"><code>"));
    }

    #[test]
    fn indented_code_blocks_are_counted() {
        let out = render("para\n\n    plain <code>\n");
        assert_eq!(out.code_blocks, 1);
        assert!(out.html.contains("plain &lt;code&gt;"));
    }

    #[test]
    fn custom_lang_prefix() {
        let opts = MarkdownOptions {
            lang_prefix: "lang-".into(),
            ..Default::default()
        };
        let out = render_html("```python\nx = 1\n```\n", &opts);
        assert!(out.html.contains("class=\"lang-python\""));
    }

    #[test]
    fn tables_depend_on_preset() {
        let md = "| a | b |\n|---|---|\n| 1 | 2 |\n";
        assert!(render(md).html.contains("<table>"));

        let strict = MarkdownOptions {
            preset: MarkdownPreset::Commonmark,
            ..Default::default()
        };
        assert!(!render_html(md, &strict).html.contains("<table>"));
    }

    #[test]
    fn syntax_rules_enable_extensions() {
        let md = "Text[^1]\n\n[^1]: note\n";
        assert!(!render(md).html.contains("footnote"));

        let opts = MarkdownOptions {
            syntax: vec!["footnote".into(), "nonsense".into()],
            ..Default::default()
        };
        assert!(render_html(md, &opts).html.contains("footnote"));
    }

    #[test]
    fn typographer_curls_quotes() {
        let opts = MarkdownOptions {
            typographer: true,
            ..Default::default()
        };
        let out = render_html("\"quoted\"", &opts).html;
        assert!(out.contains('\u{201c}'), "got: {out}");
    }

    struct Shout;

    impl MarkdownPlugin for Shout {
        fn rewrite<'a>(&self, event: Event<'a>) -> Option<Event<'a>> {
            match event {
                Event::Text(t) => Some(Event::Text(t.to_uppercase().into())),
                Event::Rule => None,
                other => Some(other),
            }
        }
    }

    #[test]
    fn plugins_rewrite_and_drop_events() {
        let opts = MarkdownOptions {
            plugins: vec![Arc::new(Shout)],
            ..Default::default()
        };
        let out = render_html("quiet\n\n---\n", &opts).html;
        assert_eq!(out, "<p>QUIET</p>\n");
    }

    /// Drops every event it sees.
    struct Swallow;

    impl MarkdownPlugin for Swallow {
        fn rewrite<'a>(&self, event: Event<'a>) -> Option<Event<'a>> {
            match event {
                Event::Text(_) => Some(event),
                _ => None,
            }
        }
    }

    #[test]
    fn plugins_cannot_unbalance_code_blocks() {
        let opts = MarkdownOptions {
            plugins: vec![Arc::new(Swallow)],
            ..Default::default()
        };
        let rendered = render_html("```\ncode\n```\n\nafter\n", &opts);
        assert_eq!(rendered.code_blocks, 1);
        assert!(rendered.html.contains("code"), "got: {}", rendered.html);
        assert!(rendered.html.contains("after"), "got: {}", rendered.html);
    }

    #[test]
    fn fence_language_parsing() {
        assert_eq!(fence_language("rust"), Some("rust".into()));
        assert_eq!(fence_language("  js title=x"), Some("js".into()));
        assert_eq!(fence_language("toml,no_run"), Some("toml".into()));
        assert_eq!(fence_language(""), None);
    }

    #[test]
    fn highlight_css_for_default_theme() {
        let css = highlight_css(DEFAULT_THEME).unwrap();
        assert!(css.contains(".hl-"), "got: {css}");
    }

    #[test]
    fn highlight_css_unknown_theme() {
        assert!(matches!(
            highlight_css("Nope"),
            Err(Md2PdfError::UnknownTheme { .. })
        ));
    }

    #[test]
    fn themes_are_listed() {
        let names = theme_names();
        assert!(names.iter().any(|n| n == DEFAULT_THEME));
        assert!(theme_exists("base16-ocean.dark"));
    }

    #[test]
    fn escape_html_escapes_all_specials() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}

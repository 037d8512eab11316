//! Pipeline stages for Markdown-to-PDF conversion.
//!
//! Each submodule implements exactly one transformation step, so every stage
//! can be tested on its own and the renderer can be swapped without touching
//! the text stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ transform ──▶ markdown ──▶ transform ──▶ document ──▶ render
//! (file/URL)  (MD hook)   (HTML body)  (HTML hook)   (full page)  (browser)
//! ```
//!
//! 1. [`input`]     — read the Markdown from a file, a URL or standard input
//! 2. [`transform`] — user hooks run on the Markdown text and on the HTML body
//! 3. [`markdown`]  — parse with pulldown-cmark, highlight fenced code with
//!    syntect
//! 4. [`document`]  — wrap the body with stylesheets, `@page` rules, running
//!    content and a `<base href>`
//! 5. [`render`]    — print the document to PDF in a headless browser; the
//!    only stage that leaves the process

pub mod document;
pub mod input;
pub mod markdown;
pub mod render;
pub mod transform;

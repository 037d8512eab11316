//! Preprocessing hooks for the Markdown and HTML stages.
//!
//! A [`Transform`] receives the whole text of its stage and returns the
//! replacement. Any closure `Fn(String) -> Result<String, Md2PdfError>` is a
//! transform, so most callers never implement the trait by hand:
//!
//! ```rust
//! use edgequake_md2pdf::{ConversionConfig, Md2PdfError};
//! use std::sync::Arc;
//!
//! let strip_drafts = |md: String| -> Result<String, Md2PdfError> {
//!     Ok(md.lines().filter(|l| !l.starts_with("DRAFT:")).collect::<Vec<_>>().join("\n"))
//! };
//!
//! let config = ConversionConfig::builder()
//!     .preprocess_markdown(Arc::new(strip_drafts))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Md2PdfError;

/// A text-to-text pipeline hook.
pub trait Transform: Send + Sync {
    /// Transform the full text of a stage.
    fn apply(&self, input: String) -> Result<String, Md2PdfError>;
}

impl<F> Transform for F
where
    F: Fn(String) -> Result<String, Md2PdfError> + Send + Sync,
{
    fn apply(&self, input: String) -> Result<String, Md2PdfError> {
        self(input)
    }
}

/// The default hook: returns its input untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn apply(&self, input: String) -> Result<String, Md2PdfError> {
        Ok(input)
    }
}

/// Runs `first` then `second`.
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A: Transform, B: Transform> Chain<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: Transform, B: Transform> Transform for Chain<A, B> {
    fn apply(&self, input: String) -> Result<String, Md2PdfError> {
        self.second.apply(self.first.apply(input)?)
    }
}

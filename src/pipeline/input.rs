//! Input resolution: turn a user-supplied source into Markdown text.
//!
//! A source is one of:
//! - `-` — standard input, read to the end;
//! - an `http://` / `https://` URL — downloaded with a timeout;
//! - anything else — a local file path.
//!
//! The whole document is read before parsing starts. Markdown cannot be
//! rendered incrementally (a reference-style link at the bottom changes a
//! paragraph at the top), so there is nothing to gain from streaming the
//! input stage.

use crate::error::Md2PdfError;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

/// Where the Markdown comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    Url(String),
    File(PathBuf),
}

impl InputSource {
    /// Classify a command-line style input string.
    pub fn parse(input: &str) -> Self {
        if input == "-" {
            InputSource::Stdin
        } else if is_url(input) {
            InputSource::Url(input.to_string())
        } else {
            InputSource::File(PathBuf::from(input))
        }
    }

    /// Human-readable name for logs and errors.
    pub fn describe(&self) -> String {
        match self {
            InputSource::Stdin => "<stdin>".to_string(),
            InputSource::Url(u) => u.clone(),
            InputSource::File(p) => p.display().to_string(),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read the Markdown text of `input`.
pub async fn read_input(input: &str, timeout_secs: u64) -> Result<String, Md2PdfError> {
    let source = InputSource::parse(input);
    match &source {
        InputSource::Stdin => read_to_string(tokio::io::stdin(), &source.describe()).await,
        InputSource::Url(url) => download_url(url, timeout_secs).await,
        InputSource::File(path) => read_local(path).await,
    }
}

/// Read an async reader to the end as UTF-8 text.
pub async fn read_to_string<R>(mut reader: R, source_name: &str) -> Result<String, Md2PdfError>
where
    R: AsyncRead + Unpin,
{
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .await
        .map_err(|e| Md2PdfError::Internal(format!("Failed to read {source_name}: {e}")))?;
    decode_utf8(bytes, source_name)
}

/// Decode bytes as UTF-8, dropping a leading byte-order mark.
pub fn decode_utf8(bytes: Vec<u8>, source_name: &str) -> Result<String, Md2PdfError> {
    let mut text = String::from_utf8(bytes).map_err(|e| Md2PdfError::InvalidUtf8 {
        source_name: source_name.to_string(),
        offset: e.utf8_error().valid_up_to(),
    })?;
    if text.starts_with('\u{feff}') {
        text.drain(..'\u{feff}'.len_utf8());
    }
    Ok(text)
}

/// Read a local file, mapping the common failures to actionable errors.
async fn read_local(path: &Path) -> Result<String, Md2PdfError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Md2PdfError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(Md2PdfError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    debug!("Read local Markdown: {} ({} bytes)", path.display(), bytes.len());
    decode_utf8(bytes, &path.display().to_string())
}

/// Download a URL and return its body as text.
async fn download_url(url: &str, timeout_secs: u64) -> Result<String, Md2PdfError> {
    info!("Downloading Markdown from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Md2PdfError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Md2PdfError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Md2PdfError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Md2PdfError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Md2PdfError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    decode_utf8(bytes.to_vec(), url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/README.md"));
        assert!(is_url("http://example.com/README.md"));
        assert!(!is_url("/tmp/README.md"));
        assert!(!is_url("README.md"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_parse_source() {
        assert_eq!(InputSource::parse("-"), InputSource::Stdin);
        assert_eq!(
            InputSource::parse("https://x.y/a.md"),
            InputSource::Url("https://x.y/a.md".into())
        );
        assert_eq!(
            InputSource::parse("notes.md"),
            InputSource::File(PathBuf::from("notes.md"))
        );
        assert_eq!(InputSource::Stdin.describe(), "<stdin>");
    }

    #[test]
    fn test_decode_strips_bom() {
        let text = decode_utf8(b"\xef\xbb\xbf# Title".to_vec(), "x").unwrap();
        assert_eq!(text, "# Title");
    }

    #[test]
    fn test_decode_reports_offset() {
        let err = decode_utf8(b"ok\xff".to_vec(), "bad.md").unwrap_err();
        match err {
            Md2PdfError::InvalidUtf8 { source_name, offset } => {
                assert_eq!(source_name, "bad.md");
                assert_eq!(offset, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_read_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "# Hello\n").unwrap();
        let text = read_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(text, "# Hello\n");
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let err = read_input("/no/such/doc.md", 5).await.unwrap_err();
        assert!(matches!(err, Md2PdfError::FileNotFound { .. }));
    }

    #[test]
    fn test_read_from_reader() {
        let text = tokio_test::block_on(read_to_string(&b"from a reader"[..], "buf")).unwrap();
        assert_eq!(text, "from a reader");
    }
}

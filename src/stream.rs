//! Streaming conversion API: hand the PDF on in chunks.
//!
//! The text stages and the renderer still run to completion first (a
//! browser only writes its PDF once the whole document is laid out). What
//! streams is the output: [`convert_reader`] yields the PDF in
//! [`CHUNK_SIZE`] pieces read lazily from the renderer's temp file, so a
//! large PDF never has to sit in memory while it is forwarded to a socket or
//! an HTTP response.
//!
//! The temp directory belongs to the stream and is removed when the stream
//! is dropped, whether or not it was read to the end.

use crate::config::ConversionConfig;
use crate::convert::{self, elapsed_ms, stage_complete, stage_start, RenderedPdf};
use crate::error::Md2PdfError;
use crate::pipeline::input;
use crate::progress::{ProgressCallback, Stage};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::time::Instant;
use tempfile::TempDir;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_stream::Stream;
use tracing::{debug, info};

/// Size of every chunk except possibly the last.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// A boxed stream of PDF byte chunks.
pub type PdfStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, Md2PdfError>> + Send>>;

/// Convert Markdown read from `reader` and stream the resulting PDF.
///
/// # Returns
/// - `Ok(PdfStream)` — the PDF in chunks; a read error ends the stream
/// - `Err(Md2PdfError)` — any failure before the PDF exists
///
/// # Example
/// ```rust,no_run
/// use edgequake_md2pdf::{convert_reader, ConversionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let markdown: &[u8] = b"# Invoice\n\nTotal: 42";
/// let mut pdf = convert_reader(markdown, &ConversionConfig::default()).await?;
/// while let Some(chunk) = pdf.next().await {
///     let chunk = chunk?;
///     println!("{} bytes", chunk.len());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn convert_reader<R>(reader: R, config: &ConversionConfig) -> Result<PdfStream, Md2PdfError>
where
    R: AsyncRead + Unpin,
{
    let started = Instant::now();
    info!("Starting streaming conversion");

    stage_start(config, Stage::ReadInput);
    let markdown = input::read_to_string(reader, "<reader>").await?;
    stage_complete(config, Stage::ReadInput, markdown.len());

    let RenderedPdf {
        dir,
        pdf_path,
        stats,
        ..
    } = convert::render_markdown(markdown, config, started).await?;

    let file = File::open(&pdf_path).await.map_err(Md2PdfError::TempFile)?;
    stage_start(config, Stage::ReadPdf);
    debug!(
        "Streaming {} bytes of PDF ({}ms so far)",
        stats.pdf_bytes,
        elapsed_ms(started)
    );

    let state = ChunkReader {
        file,
        _dir: dir,
        progress: config.progress_callback.clone(),
        sent: 0,
        done: false,
    };

    Ok(Box::pin(stream::unfold(state, |mut st| async move {
        st.next_chunk().await.map(|item| (item, st))
    })))
}

/// Convert Markdown read from `reader` and write the PDF to `writer`.
///
/// Returns the number of PDF bytes written. The writer is flushed but not
/// shut down.
pub async fn convert_to_writer<R, W>(
    reader: R,
    mut writer: W,
    config: &ConversionConfig,
) -> Result<u64, Md2PdfError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut pdf = convert_reader(reader, config).await?;
    let mut written: u64 = 0;

    while let Some(chunk) = pdf.next().await {
        let chunk = chunk?;
        writer
            .write_all(&chunk)
            .await
            .map_err(Md2PdfError::StreamWriteFailed)?;
        written += chunk.len() as u64;
    }
    writer.flush().await.map_err(Md2PdfError::StreamWriteFailed)?;

    Ok(written)
}

/// Stream state: the open PDF plus the temp directory that holds it.
struct ChunkReader {
    file: File,
    _dir: TempDir,
    progress: Option<ProgressCallback>,
    sent: usize,
    done: bool,
}

impl ChunkReader {
    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, Md2PdfError>> {
        if self.done {
            return None;
        }

        let mut buf = Vec::with_capacity(CHUNK_SIZE);
        match (&mut self.file).take(CHUNK_SIZE as u64).read_to_end(&mut buf).await {
            Ok(0) => {
                self.done = true;
                if let Some(ref cb) = self.progress {
                    cb.on_stage_complete(Stage::ReadPdf, self.sent);
                    cb.on_conversion_complete(self.sent);
                }
                info!("Streaming conversion complete: {} bytes of PDF", self.sent);
                None
            }
            Ok(n) => {
                self.sent += n;
                Some(Ok(buf))
            }
            Err(e) => {
                self.done = true;
                Some(Err(Md2PdfError::TempFile(e)))
            }
        }
    }
}

//! PDF rendering: hand the assembled HTML file to an out-of-process browser.
//!
//! Layout, pagination and PDF generation all happen inside the browser. This
//! module only builds the command line, supervises the child process and
//! turns its exit into a `Result`.
//!
//! ## Why a trait?
//!
//! [`PdfRenderer`] is the seam between the pipeline and the outside world.
//! [`ChromeRenderer`] drives a real Chromium-family binary; tests and
//! embedders can plug in anything that writes a PDF to `job.pdf_path`.
//!
//! ## Supervision
//!
//! The child's stdout and stderr are drained line by line into `tracing`
//! (stdout at INFO, stderr at WARN) and forwarded to the progress callback.
//! The whole process is bounded by `load_timeout + render_delay + grace`
//! (grace defaults to [`RENDERER_GRACE`]); past that it is killed. `kill_on_drop` also covers
//! the caller dropping the conversion future mid-render.

use crate::config::ConversionConfig;
use crate::error::Md2PdfError;
use crate::progress::ProgressCallback;
use futures::future::BoxFuture;
use reqwest::Url;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Slack added to the renderer deadline for browser start-up and PDF output.
pub const RENDERER_GRACE: Duration = Duration::from_secs(30);

/// How many trailing stderr lines are kept for the error message.
const STDERR_TAIL_LINES: usize = 20;

/// Everything a renderer needs for one document.
#[derive(Clone)]
pub struct RenderJob {
    /// The complete HTML document.
    pub html_path: PathBuf,
    /// Where the PDF must be written.
    pub pdf_path: PathBuf,
    /// Scratch directory owned by this conversion (browser profile etc.).
    pub work_dir: PathBuf,
    /// Working directory for the child process.
    pub cwd: PathBuf,
    /// Milliseconds to wait after load before printing.
    pub render_delay_ms: u64,
    /// Page-load timeout in milliseconds.
    pub load_timeout_ms: u64,
    /// Receives the renderer's output lines.
    pub progress: Option<ProgressCallback>,
}

impl RenderJob {
    /// Upper bound on the renderer's wall-clock time with the default grace.
    pub fn deadline(&self) -> Duration {
        self.deadline_with_grace(RENDERER_GRACE)
    }

    pub fn deadline_with_grace(&self, grace: Duration) -> Duration {
        Duration::from_millis(self.load_timeout_ms.saturating_add(self.render_delay_ms)) + grace
    }
}

/// Turns an HTML file into a PDF file.
pub trait PdfRenderer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Render `job.html_path` into `job.pdf_path`.
    fn render<'a>(&'a self, job: &'a RenderJob) -> BoxFuture<'a, Result<(), Md2PdfError>>;
}

/// Pick the renderer for `config`, from most-specific to least-specific:
/// a pre-built renderer, an explicit browser path, then auto-detection
/// (`MD2PDF_BROWSER`, `PATH`, standard install locations).
pub fn resolve_renderer(config: &ConversionConfig) -> Result<Arc<dyn PdfRenderer>, Md2PdfError> {
    if let Some(ref renderer) = config.renderer {
        return Ok(Arc::clone(renderer));
    }

    let renderer = match config.browser_path {
        Some(ref path) => ChromeRenderer::new(path),
        None => ChromeRenderer::detect()?,
    };
    Ok(Arc::new(renderer.with_args(config.browser_args.clone())))
}

/// Prints through a Chromium-family browser in headless mode.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    executable: PathBuf,
    extra_args: Vec<String>,
    grace: Duration,
}

impl ChromeRenderer {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            extra_args: Vec::new(),
            grace: RENDERER_GRACE,
        }
    }

    /// Locate an installed browser.
    pub fn detect() -> Result<Self, Md2PdfError> {
        let path = browser_locate::find_browser()?;
        info!("Using browser: {}", path.display());
        Ok(Self::new(path))
    }

    /// Append extra command-line switches (e.g. `--no-sandbox` in containers).
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args.extend(args);
        self
    }

    /// Replace the slack added on top of the load timeout and render delay.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// The full argument list for `job`.
    pub fn args(&self, job: &RenderJob) -> Result<Vec<OsString>, Md2PdfError> {
        let url = Url::from_file_path(&job.html_path).map_err(|()| {
            Md2PdfError::Internal(format!(
                "HTML path '{}' is not absolute",
                job.html_path.display()
            ))
        })?;

        let mut args: Vec<OsString> = [
            "--headless",
            "--disable-gpu",
            "--no-first-run",
            "--no-default-browser-check",
            "--no-pdf-header-footer",
            "--print-to-pdf-no-header",
            "--allow-file-access-from-files",
            "--run-all-compositor-stages-before-draw",
        ]
        .iter()
        .map(OsString::from)
        .collect();

        args.push(flag_with_path("--user-data-dir=", &job.work_dir.join("profile")));
        args.push(format!("--timeout={}", job.load_timeout_ms).into());
        if job.render_delay_ms > 0 {
            args.push(format!("--virtual-time-budget={}", job.render_delay_ms).into());
        }
        args.push(flag_with_path("--print-to-pdf=", &job.pdf_path));
        args.extend(self.extra_args.iter().map(OsString::from));
        args.push(url.to_string().into());

        Ok(args)
    }

    async fn run(&self, job: &RenderJob) -> Result<(), Md2PdfError> {
        browser_locate::ensure_executable(&self.executable).map_err(|e| {
            Md2PdfError::BrowserUnusable {
                path: self.executable.clone(),
                source: e,
            }
        })?;

        let args = self.args(job)?;
        debug!("Spawning {} {:?}", self.executable.display(), args);

        let mut child = Command::new(&self.executable)
            .args(&args)
            .current_dir(&job.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Md2PdfError::RendererSpawnFailed {
                path: self.executable.clone(),
                source: e,
            })?;

        let stdout_task = tokio::spawn(drain_lines(child.stdout.take(), job.progress.clone(), false));
        let stderr_task = tokio::spawn(drain_lines(child.stderr.take(), job.progress.clone(), true));

        let deadline = job.deadline_with_grace(self.grace);
        let status = match tokio::time::timeout(deadline, child.wait()).await {
            Ok(status) => status.map_err(|e| Md2PdfError::Internal(format!("wait on renderer: {e}")))?,
            Err(_) => {
                warn!("Renderer exceeded {}ms, killing it", deadline.as_millis());
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill renderer: {}", e);
                }
                return Err(Md2PdfError::RendererTimeout {
                    ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                });
            }
        };

        // Both pipes close when the child exits, so these finish promptly.
        let _ = stdout_task.await;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(Md2PdfError::RendererFailed {
                status: status.to_string(),
                stderr: stderr_tail,
            });
        }

        match tokio::fs::metadata(&job.pdf_path).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(Md2PdfError::EmptyPdf {
                path: job.pdf_path.clone(),
            }),
        }
    }
}

impl PdfRenderer for ChromeRenderer {
    fn name(&self) -> &str {
        "chrome"
    }

    fn render<'a>(&'a self, job: &'a RenderJob) -> BoxFuture<'a, Result<(), Md2PdfError>> {
        Box::pin(self.run(job))
    }
}

fn flag_with_path(flag: &str, path: &Path) -> OsString {
    let mut s = OsString::from(flag);
    s.push(path.as_os_str());
    s
}

/// Log every line of a child pipe; returns the last few lines.
async fn drain_lines<R>(pipe: Option<R>, progress: Option<ProgressCallback>, is_stderr: bool) -> String
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(pipe) = pipe else {
        return String::new();
    };

    let mut lines = BufReader::new(pipe).lines();
    let mut tail: Vec<String> = Vec::new();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                if is_stderr {
                    warn!(target: "md2pdf::renderer", "{}", line);
                } else {
                    info!(target: "md2pdf::renderer", "{}", line);
                }
                if let Some(ref cb) = progress {
                    cb.on_renderer_output(&line);
                }
                if tail.len() == STDERR_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line);
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading renderer output: {}", e);
                break;
            }
        }
    }

    tail.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(dir: &Path) -> RenderJob {
        RenderJob {
            html_path: dir.join("doc.html"),
            pdf_path: dir.join("doc.pdf"),
            work_dir: dir.to_path_buf(),
            cwd: dir.to_path_buf(),
            render_delay_ms: 0,
            load_timeout_ms: 10_000,
            progress: None,
        }
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn deadline_adds_grace() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = job(dir.path());
        j.render_delay_ms = 500;
        assert_eq!(j.deadline(), Duration::from_millis(10_500) + RENDERER_GRACE);
        assert_eq!(
            j.deadline_with_grace(Duration::from_millis(100)),
            Duration::from_millis(10_600)
        );
    }

    #[test]
    fn args_without_delay() {
        let dir = tempfile::tempdir().unwrap();
        let j = job(dir.path());
        let args = strings(ChromeRenderer::new("/usr/bin/chromium").args(&j).unwrap());

        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--no-pdf-header-footer".to_string()));
        assert!(args.contains(&"--timeout=10000".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--virtual-time-budget")));
        assert!(args.contains(&format!("--print-to-pdf={}", j.pdf_path.display())));
        assert!(args.last().unwrap().starts_with("file://"));
        assert!(args.last().unwrap().ends_with("doc.html"));
    }

    #[test]
    fn args_with_delay_and_extras() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = job(dir.path());
        j.render_delay_ms = 1500;
        let renderer = ChromeRenderer::new("chrome").with_args(vec!["--no-sandbox".into()]);
        let args = strings(renderer.args(&j).unwrap());

        assert!(args.contains(&"--virtual-time-budget=1500".to_string()));
        let sandbox = args.iter().position(|a| a == "--no-sandbox").unwrap();
        assert_eq!(sandbox, args.len() - 2, "extra args go right before the URL");
    }

    #[test]
    fn relative_html_path_is_rejected() {
        let mut j = job(Path::new("/tmp"));
        j.html_path = PathBuf::from("doc.html");
        assert!(ChromeRenderer::new("chrome").args(&j).is_err());
    }

    #[test]
    fn resolve_prefers_prebuilt_renderer() {
        let prebuilt: Arc<dyn PdfRenderer> = Arc::new(ChromeRenderer::new("/opt/custom"));
        let config = ConversionConfig {
            renderer: Some(Arc::clone(&prebuilt)),
            browser_path: Some(PathBuf::from("/ignored")),
            ..Default::default()
        };
        let resolved = resolve_renderer(&config).unwrap();
        assert!(Arc::ptr_eq(&resolved, &prebuilt));
    }

    #[test]
    fn resolve_uses_browser_path() {
        let config = ConversionConfig {
            browser_path: Some(PathBuf::from("/opt/chrome")),
            ..Default::default()
        };
        assert_eq!(resolve_renderer(&config).unwrap().name(), "chrome");
    }

    #[tokio::test]
    async fn missing_executable_fails_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let j = job(dir.path());
        let err = ChromeRenderer::new(dir.path().join("no-browser"))
            .render(&j)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Md2PdfError::BrowserUnusable { .. }),
            "got: {err}"
        );
    }
}

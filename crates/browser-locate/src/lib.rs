//! # browser-locate
//!
//! Find an installed Chromium-family browser (Chromium, Google Chrome,
//! Microsoft Edge) that can print HTML to PDF in headless mode, so that users
//! of `md2pdf` don't have to pass `--browser` on every run.
//!
//! ## How it works
//!
//! On first call to [`find_browser`]:
//!
//! 1. Checks the `MD2PDF_BROWSER` environment variable.
//! 2. Searches every directory of `PATH` for the well-known executable names.
//! 3. Probes the platform's standard install locations (`.app` bundles on
//!    macOS, `Program Files` on Windows, `/usr/bin` & friends on Linux).
//!
//! The result is cached for the lifetime of the process.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use browser_locate::{ensure_executable, find_browser};
//!
//! let chrome = find_browser().expect("no Chromium-family browser installed");
//! ensure_executable(&chrome).expect("browser is not executable");
//! println!("printing with {}", chrome.display());
//! ```
//!
//! ## Environment variable overrides
//!
//! - `MD2PDF_BROWSER` — path to a browser executable; skips the search.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variable holding an explicit browser path.
pub const BROWSER_ENV: &str = "MD2PDF_BROWSER";

/// Executable names searched on `PATH`, in order of preference.
pub const CANDIDATE_NAMES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "microsoft-edge",
    "msedge",
];

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by browser-locate operations.
#[derive(Error, Debug)]
pub enum BrowserLocateError {
    /// `MD2PDF_BROWSER` is set but points at nothing.
    #[error("{BROWSER_ENV} is set to '{path}' but no file exists there")]
    EnvPathMissing { path: PathBuf },

    /// Nothing usable on `PATH` nor in the standard install locations.
    #[error("No Chromium-family browser found (searched {searched} locations)")]
    NotFound { searched: usize },

    /// The executable bit is missing and could not be added.
    #[error("Cannot make '{path}' executable: {source}")]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The path does not exist or cannot be inspected.
    #[error("Cannot inspect '{path}': {source}")]
    Inspect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns the path of a usable browser, searching only once per process.
pub fn find_browser() -> Result<PathBuf, BrowserLocateError> {
    if let Some(path) = RESOLVED_PATH.get() {
        return Ok(path.clone());
    }

    let path = find_browser_uncached()?;

    // Best-effort cache in the OnceLock (ignore race; both found the same).
    let _ = RESOLVED_PATH.set(path.clone());

    Ok(path)
}

/// Same as [`find_browser`] but always performs a fresh search.
pub fn find_browser_uncached() -> Result<PathBuf, BrowserLocateError> {
    // 1. Environment variable override. Unlike PATH lookups a stale override
    //    is an error: the user asked for that exact binary.
    if let Some(env_path) = std::env::var_os(BROWSER_ENV) {
        if !env_path.is_empty() {
            let p = PathBuf::from(env_path);
            if p.exists() {
                return Ok(p);
            }
            return Err(BrowserLocateError::EnvPathMissing { path: p });
        }
    }

    // 2. PATH.
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    if let Some(p) = find_in_path(&path_var, CANDIDATE_NAMES) {
        return Ok(p);
    }

    // 3. Standard install locations.
    let installs = platform_install_paths();
    if let Some(p) = installs.iter().find(|p| p.is_file()) {
        return Ok(p.clone());
    }

    Err(BrowserLocateError::NotFound {
        searched: std::env::split_paths(&path_var).count() * CANDIDATE_NAMES.len()
            + installs.len(),
    })
}

/// Searches the directories in `path_var` (a `PATH`-style list) for the
/// first of `names` that exists as a file.
///
/// Directories are walked in order; within a directory, `names` are tried
/// in order. The platform executable suffix (`.exe`) is appended.
pub fn find_in_path(path_var: &OsStr, names: &[&str]) -> Option<PathBuf> {
    for dir in std::env::split_paths(path_var) {
        for name in names {
            let candidate = dir.join(format!("{name}{}", std::env::consts::EXE_SUFFIX));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Standard install locations for the current platform.
pub fn platform_install_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if cfg!(target_os = "macos") {
        const BUNDLES: &[&str] = &[
            "Google Chrome.app/Contents/MacOS/Google Chrome",
            "Chromium.app/Contents/MacOS/Chromium",
            "Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ];
        let mut roots = vec![PathBuf::from("/Applications")];
        if let Some(home) = dirs::home_dir() {
            roots.push(home.join("Applications"));
        }
        for root in &roots {
            paths.extend(BUNDLES.iter().map(|b| root.join(b)));
        }
    } else if cfg!(target_os = "windows") {
        const SUFFIXES: &[&str] = &[
            r"Google\Chrome\Application\chrome.exe",
            r"Chromium\Application\chrome.exe",
            r"Microsoft\Edge\Application\msedge.exe",
        ];
        let mut roots: Vec<PathBuf> = ["ProgramFiles", "ProgramFiles(x86)"]
            .iter()
            .filter_map(|var| std::env::var_os(var).map(PathBuf::from))
            .collect();
        if let Some(local) = dirs::data_local_dir() {
            roots.push(local);
        }
        for root in &roots {
            paths.extend(SUFFIXES.iter().map(|s| root.join(s)));
        }
    } else {
        for dir in ["/usr/bin", "/usr/local/bin", "/snap/bin", "/opt/google/chrome"] {
            paths.extend(CANDIDATE_NAMES.iter().map(|n| Path::new(dir).join(n)));
        }
    }

    paths
}

/// Returns `true` when `path` is a file the current user may execute.
///
/// On non-unix platforms every existing file counts as executable.
pub fn is_executable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && has_exec_bit(&meta),
        Err(_) => false,
    }
}

/// Makes sure `path` can be executed, adding `0o755` permissions if the
/// execute bit is missing.
pub fn ensure_executable(path: &Path) -> Result<(), BrowserLocateError> {
    let meta = std::fs::metadata(path).map_err(|e| BrowserLocateError::Inspect {
        path: path.to_path_buf(),
        source: e,
    })?;

    if has_exec_bit(&meta) {
        return Ok(());
    }

    set_mode_755(path).map_err(|e| BrowserLocateError::Permissions {
        path: path.to_path_buf(),
        source: e,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────────

#[cfg(unix)]
fn has_exec_bit(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_exec_bit(_meta: &std::fs::Metadata) -> bool {
    true
}

#[cfg(unix)]
fn set_mode_755(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_mode_755(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

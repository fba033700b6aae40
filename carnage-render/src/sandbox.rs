//! Per-render scratch directory and browser profile.
//!
//! Every render gets a fresh directory under the sandbox root holding the
//! generated document, the browser's `--user-data-dir` and the screenshot.
//! Dropping the guard removes the directory, on success, error and timeout
//! alike.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

pub struct RenderSandbox {
    dir: PathBuf,
}

impl RenderSandbox {
    /// Create `<root>/render-<pid>-<n>/profile`.
    pub fn create(root: &Path) -> std::io::Result<Self> {
        let n = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let dir = root.join(format!("render-{}-{}", std::process::id(), n));
        std::fs::create_dir_all(dir.join("profile"))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn profile_dir(&self) -> PathBuf {
        self.dir.join("profile")
    }

    pub fn document_path(&self) -> PathBuf {
        self.dir.join("match.html")
    }

    pub fn screenshot_path(&self) -> PathBuf {
        self.dir.join("match.png")
    }
}

impl Drop for RenderSandbox {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove render sandbox {}: {}", self.dir.display(), e);
            }
        }
    }
}

//! Headless Chromium screenshot renderer.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use carnage_core::MatchRecord;
use futures::future::BoxFuture;
use tokio::process::Command;

use crate::browser::detect_browser;
use crate::document::match_document;
use crate::sandbox::RenderSandbox;
use crate::{RenderError, RenderedImage, Renderer};

/// Settings for [`ChromiumRenderer`].
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Explicit browser binary; detected when `None`.
    pub browser: Option<PathBuf>,
    /// Parent of the per-render sandboxes. Must not be shared with any
    /// other browser profile.
    pub sandbox_root: PathBuf,
    pub timeout: Duration,
    pub width: u32,
    pub height: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            browser: None,
            sandbox_root: std::env::temp_dir().join("carnage-relay-render"),
            timeout: Duration::from_secs(30),
            width: 1200,
            height: 1000,
        }
    }
}

/// Launches one isolated headless browser per render call.
pub struct ChromiumRenderer {
    browser: PathBuf,
    config: RenderConfig,
}

impl ChromiumRenderer {
    pub fn new(config: RenderConfig) -> Result<Self, RenderError> {
        let browser = detect_browser(config.browser.as_deref()).ok_or(RenderError::BrowserNotFound)?;
        log::info!("Renderer using browser {}", browser.display());
        Ok(Self { browser, config })
    }

    pub fn browser(&self) -> &Path {
        &self.browser
    }

    fn command(&self, sandbox: &RenderSandbox) -> Command {
        let mut cmd = Command::new(&self.browser);
        cmd.arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--hide-scrollbars")
            .arg(format!("--user-data-dir={}", sandbox.profile_dir().display()))
            .arg(format!("--window-size={},{}", self.config.width, self.config.height))
            .arg(format!("--screenshot={}", sandbox.screenshot_path().display()))
            .arg(format!("file://{}", sandbox.document_path().display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    async fn render_in_sandbox(
        &self,
        record: &MatchRecord,
        sandbox: &RenderSandbox,
    ) -> Result<RenderedImage, RenderError> {
        tokio::fs::write(sandbox.document_path(), match_document(record)).await?;

        let mut child = self.command(sandbox).spawn().map_err(|e| {
            RenderError::engine(format!("cannot launch {}: {}", self.browser.display(), e))
        })?;

        let status = match tokio::time::timeout(self.config.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill timed-out browser: {}", e);
                }
                return Err(RenderError::Timeout(self.config.timeout));
            }
        };
        if !status.success() {
            return Err(RenderError::engine(format!("browser exited with {}", status)));
        }

        let png = match tokio::fs::read(sandbox.screenshot_path()).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RenderError::engine("browser produced no screenshot"));
            }
            Err(e) => return Err(e.into()),
        };
        RenderedImage::from_png(png)
    }
}

impl Renderer for ChromiumRenderer {
    fn render<'a>(&'a self, record: &'a MatchRecord) -> BoxFuture<'a, Result<RenderedImage, RenderError>> {
        Box::pin(async move {
            let sandbox = RenderSandbox::create(&self.config.sandbox_root)?;
            log::debug!(
                "Rendering match {} in {}",
                record.match_id,
                sandbox.path().display()
            );
            let result = self.render_in_sandbox(record, &sandbox).await;
            drop(sandbox);
            result
        })
    }
}

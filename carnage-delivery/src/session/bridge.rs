//! [`SessionDriver`] backed by a local HTTP bridge process that owns the
//! browser-automated chat client.

use std::path::Path;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tokio::process::{Child, Command};

use super::driver::{ChatInfo, DriverStatus, SessionDriver};
use crate::error::SessionError;

/// How long to wait for a freshly spawned bridge to answer.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
const STARTUP_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub base_url: String,
    /// argv used to spawn the bridge; `None` when it is managed externally.
    pub command: Option<Vec<String>>,
    pub request_timeout: Duration,
}

pub struct BridgeDriver {
    http: reqwest::Client,
    base_url: String,
    command: Option<Vec<String>>,
    child: Mutex<Option<Child>>,
}

impl BridgeDriver {
    pub fn new(config: BridgeConfig) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            command: config.command.filter(|argv| !argv.is_empty()),
            child: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn spawn_bridge(&self, profile_dir: &Path) -> Result<(), SessionError> {
        let Some(argv) = &self.command else {
            return Ok(());
        };
        let mut guard = self.child.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(child) = guard.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                return Ok(());
            }
        }
        log::info!("Spawning session bridge: {}", argv.join(" "));
        let child = Command::new(&argv[0])
            .args(&argv[1..])
            .arg("--profile-dir")
            .arg(profile_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(SessionError::Launch)?;
        *guard = Some(child);
        Ok(())
    }

    async fn wait_until_reachable(&self) -> Result<(), SessionError> {
        let deadline = tokio::time::Instant::now() + STARTUP_TIMEOUT;
        loop {
            match self.http.get(self.url("/session/status")).send().await {
                Ok(_) => return Ok(()),
                Err(e) if tokio::time::Instant::now() >= deadline => return Err(e.into()),
                Err(_) => tokio::time::sleep(STARTUP_POLL).await,
            }
        }
    }

    fn take_child(&self) -> Option<Child> {
        self.child.lock().unwrap_or_else(|p| p.into_inner()).take()
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SessionError> {
        let response = self.http.get(self.url(path)).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn post_empty(&self, path: &str, body: serde_json::Value) -> Result<(), SessionError> {
        let response = self.http.post(self.url(path)).json(&body).send().await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, SessionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    // The bridge answers errors as {"error": "..."}; fall back to the raw body.
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(body);
    Err(SessionError::Bridge {
        status: status.as_u16(),
        message,
    })
}

impl SessionDriver for BridgeDriver {
    fn launch<'a>(&'a self, profile_dir: &'a Path) -> BoxFuture<'a, Result<(), SessionError>> {
        Box::pin(async move {
            std::fs::create_dir_all(profile_dir)?;
            self.spawn_bridge(profile_dir)?;
            self.wait_until_reachable().await?;
            self.post_empty(
                "/session/start",
                serde_json::json!({ "profile_dir": profile_dir.to_string_lossy() }),
            )
            .await
        })
    }

    fn status(&self) -> BoxFuture<'_, Result<DriverStatus, SessionError>> {
        Box::pin(self.get_json("/session/status"))
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(async move {
            let response = self.http.get(self.url("/session/ping")).send().await?;
            check(response).await?;
            Ok(())
        })
    }

    fn send_media<'a>(
        &'a self,
        chat_id: &'a str,
        png: &'a [u8],
        caption: &'a str,
    ) -> BoxFuture<'a, Result<(), SessionError>> {
        Box::pin(async move {
            let file = Part::bytes(png.to_vec())
                .file_name("match.png")
                .mime_str("image/png")?;
            let form = Form::new()
                .text("chat_id", chat_id.to_string())
                .text("caption", caption.to_string())
                .part("file", file);
            let response = self
                .http
                .post(self.url("/messages/media"))
                .multipart(form)
                .send()
                .await?;
            check(response).await?;
            Ok(())
        })
    }

    fn send_text<'a>(&'a self, chat_id: &'a str, text: &'a str) -> BoxFuture<'a, Result<(), SessionError>> {
        Box::pin(self.post_empty(
            "/messages/text",
            serde_json::json!({ "chat_id": chat_id, "text": text }),
        ))
    }

    fn list_chats(&self) -> BoxFuture<'_, Result<Vec<ChatInfo>, SessionError>> {
        Box::pin(self.get_json("/chats"))
    }

    fn shutdown(&self) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(async move {
            let stop = self.post_empty("/session/stop", serde_json::json!({})).await;
            if let Some(mut child) = self.take_child() {
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill session bridge: {}", e);
                }
            }
            // A bridge we own is gone either way; an external one may already be down.
            match stop {
                Err(SessionError::Http(e)) if e.is_connect() => Ok(()),
                other => other,
            }
        })
    }
}

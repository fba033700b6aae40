//! Webhook-style chat destination.

use std::sync::RwLock;
use std::time::Duration;

use reqwest::multipart::{Form, Part};

use crate::error::DeliveryError;

const BODY_PREVIEW: usize = 200;

/// HTTP client for a chat webhook. The URL can be swapped at runtime and is
/// read fresh on every call.
pub struct WebhookClient {
    http: reqwest::Client,
    url: RwLock<Option<String>>,
}

impl WebhookClient {
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("carnage-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            url: RwLock::new(url.filter(|u| !u.trim().is_empty())),
        })
    }

    pub fn url(&self) -> Option<String> {
        self.url.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn set_url(&self, url: Option<String>) {
        let url = url.filter(|u| !u.trim().is_empty());
        log::info!(
            "Webhook URL {}",
            match &url {
                Some(u) => format!("set to {}", redact(u)),
                None => "cleared".to_string(),
            }
        );
        *self.url.write().unwrap_or_else(|p| p.into_inner()) = url;
    }

    pub fn is_configured(&self) -> bool {
        self.url().is_some()
    }

    fn require_url(&self) -> Result<String, DeliveryError> {
        self.url()
            .ok_or_else(|| DeliveryError::NotConfigured("webhook URL not set".to_string()))
    }

    /// Post an image with a text caption as a multipart form.
    pub async fn send_image(&self, png: &[u8], file_name: &str, content: &str) -> Result<(), DeliveryError> {
        let url = self.require_url()?;
        let file = Part::bytes(png.to_vec())
            .file_name(file_name.to_string())
            .mime_str("image/png")?;
        let form = Form::new().text("content", content.to_string()).part("file", file);
        let response = self.http.post(&url).multipart(form).send().await?;
        check_status(response).await
    }

    /// Post a plain text message.
    pub async fn send_text(&self, content: &str) -> Result<(), DeliveryError> {
        let url = self.require_url()?;
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await?;
        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<(), DeliveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    let preview: String = body.chars().take(BODY_PREVIEW).collect();
    Err(DeliveryError::Transport(format!(
        "HTTP {}: {}",
        status.as_u16(),
        preview.trim()
    )))
}

/// Hide the token part of a webhook URL for logs.
pub fn redact(url: &str) -> String {
    match url.rsplit_once('/') {
        Some((head, tail)) if !tail.is_empty() && head.contains("://") => format!("{}/***", head),
        _ => url.to_string(),
    }
}

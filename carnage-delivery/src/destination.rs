//! Delivery destinations driven by the fanout.

use std::sync::Arc;

use carnage_core::MatchRecord;
use futures::future::BoxFuture;

use crate::error::DeliveryError;
use crate::session::{SessionDriver, SessionKeeper, SessionState};
use crate::summary::{fallback_table, session_caption, webhook_caption};
use crate::webhook::WebhookClient;

/// Whether a destination can take a delivery right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Not configured or not usable for this match; nothing is attempted.
    Skip(String),
    /// Temporarily unavailable (e.g. mid-restart).
    NotReady(String),
}

/// One place a rendered match is sent to.
pub trait Destination: Send + Sync {
    fn name(&self) -> &str;

    fn readiness(&self) -> Readiness;

    fn send_image<'a>(
        &'a self,
        png: &'a [u8],
        file_name: &'a str,
        record: &'a MatchRecord,
    ) -> BoxFuture<'a, Result<(), DeliveryError>>;

    /// Plain-text stats, used when the image can't be delivered.
    fn send_fallback<'a>(&'a self, record: &'a MatchRecord) -> BoxFuture<'a, Result<(), DeliveryError>>;

    /// Called once retries are used up.
    fn on_exhausted(&self, _error: &DeliveryError) {}
}

/// Destination A: a webhook taking multipart uploads.
pub struct WebhookDestination {
    client: Arc<WebhookClient>,
}

impl WebhookDestination {
    pub fn new(client: Arc<WebhookClient>) -> Self {
        Self { client }
    }
}

impl Destination for WebhookDestination {
    fn name(&self) -> &str {
        "webhook"
    }

    fn readiness(&self) -> Readiness {
        if self.client.is_configured() {
            Readiness::Ready
        } else {
            Readiness::Skip("webhook URL not set".to_string())
        }
    }

    fn send_image<'a>(
        &'a self,
        png: &'a [u8],
        file_name: &'a str,
        record: &'a MatchRecord,
    ) -> BoxFuture<'a, Result<(), DeliveryError>> {
        Box::pin(async move {
            self.client
                .send_image(png, file_name, &webhook_caption(record))
                .await
        })
    }

    fn send_fallback<'a>(&'a self, record: &'a MatchRecord) -> BoxFuture<'a, Result<(), DeliveryError>> {
        Box::pin(async move { self.client.send_text(&fallback_table(record)).await })
    }
}

/// Destination B: the long-lived chat session.
pub struct SessionDestination<D> {
    keeper: SessionKeeper<D>,
}

impl<D: SessionDriver> SessionDestination<D> {
    pub fn new(keeper: SessionKeeper<D>) -> Self {
        Self { keeper }
    }
}

impl<D: SessionDriver> Destination for SessionDestination<D> {
    fn name(&self) -> &str {
        "session"
    }

    fn readiness(&self) -> Readiness {
        if self.keeper.chat_id().is_none() {
            return Readiness::Skip("no target chat".to_string());
        }
        match self.keeper.state() {
            SessionState::Ready => Readiness::Ready,
            SessionState::Restarting => Readiness::NotReady("session restarting".to_string()),
            other => Readiness::Skip(format!("session {}", other.label())),
        }
    }

    fn send_image<'a>(
        &'a self,
        png: &'a [u8],
        _file_name: &'a str,
        record: &'a MatchRecord,
    ) -> BoxFuture<'a, Result<(), DeliveryError>> {
        Box::pin(async move {
            self.keeper
                .send_image(png, &session_caption(record))
                .await
                .map_err(DeliveryError::from)
        })
    }

    fn send_fallback<'a>(&'a self, record: &'a MatchRecord) -> BoxFuture<'a, Result<(), DeliveryError>> {
        Box::pin(async move {
            self.keeper
                .send_text(&fallback_table(record))
                .await
                .map_err(DeliveryError::from)
        })
    }

    fn on_exhausted(&self, error: &DeliveryError) {
        if error.is_critical() {
            self.keeper.request_restart(error.to_string());
        }
    }
}

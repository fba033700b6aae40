use std::path::Path;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Connection state reported by the chat client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    Starting,
    /// Waiting for the operator to scan a login code.
    Qr,
    Connected,
    Disconnected,
    AuthFailure,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverStatus {
    pub state: DriverState,
    #[serde(default)]
    pub qr: Option<String>,
}

/// A chat the session can deliver to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatInfo {
    pub id: String,
    pub name: String,
}

/// Low-level handle on a browser-automated chat client.
///
/// Only the session keeper talks to a driver; everything else goes through
/// the keeper.
pub trait SessionDriver: Send + Sync + 'static {
    /// Start (or restart) the client using `profile_dir` for its storage.
    fn launch<'a>(&'a self, profile_dir: &'a Path) -> BoxFuture<'a, Result<(), SessionError>>;

    fn status(&self) -> BoxFuture<'_, Result<DriverStatus, SessionError>>;

    /// Cheap liveness check against the underlying page.
    fn ping(&self) -> BoxFuture<'_, Result<(), SessionError>>;

    fn send_media<'a>(
        &'a self,
        chat_id: &'a str,
        png: &'a [u8],
        caption: &'a str,
    ) -> BoxFuture<'a, Result<(), SessionError>>;

    fn send_text<'a>(&'a self, chat_id: &'a str, text: &'a str) -> BoxFuture<'a, Result<(), SessionError>>;

    fn list_chats(&self) -> BoxFuture<'_, Result<Vec<ChatInfo>, SessionError>>;

    /// Stop the client and release its profile directory.
    fn shutdown(&self) -> BoxFuture<'_, Result<(), SessionError>>;
}

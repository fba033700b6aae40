pub(crate) mod config;
pub(crate) mod parse;
pub(crate) mod process;
pub(crate) mod render;
pub(crate) mod status;
pub(crate) mod watch;

use std::path::Path;

use carnage_delivery::SessionState;
use carnage_lib::{Overrides, Relay, Settings};

use crate::CliError;

pub(crate) fn load_settings(config: Option<&Path>, overrides: &Overrides) -> Result<Settings, CliError> {
    Ok(Settings::load(config, overrides)?)
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new().map_err(|e| CliError::runtime(format!("Failed to create tokio runtime: {}", e)))
}

/// Resolves on Ctrl-C.
pub(crate) async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Shutting down..."),
        Err(e) => log::error!("Cannot listen for Ctrl-C: {}", e),
    }
}

/// Start the chat session and wait until it is usable or has given up.
pub(crate) async fn start_session_and_wait(relay: &Relay) {
    let Some(keeper) = relay.session() else {
        return;
    };
    relay.start_session().await;
    let deadline = relay.settings().session.handshake_timeout;
    let mut states = keeper.subscribe();
    let settled = tokio::time::timeout(
        deadline,
        states.wait_for(|s| {
            matches!(
                s,
                SessionState::Ready | SessionState::Degraded { .. } | SessionState::Terminated
            )
        }),
    )
    .await;
    if settled.is_err() {
        log::warn!("Chat session not ready; continuing without it");
    }
}

/// Truncate a string to a maximum width, appending "..." if needed.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

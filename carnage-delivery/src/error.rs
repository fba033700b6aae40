/// Errors raised by a delivery destination.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Non-2xx response or network failure. Triggers the text fallback.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session disconnected: {0}")]
    SessionDisconnected(String),

    #[error("Destination not configured: {0}")]
    NotConfigured(String),
}

impl DeliveryError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, DeliveryError::Transport(_))
    }

    /// The browser page backing the session is gone; only a restart helps.
    pub fn is_critical(&self) -> bool {
        is_detached_frame(&self.to_string())
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        DeliveryError::Transport(e.to_string())
    }
}

impl From<SessionError> for DeliveryError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotReady(state) => DeliveryError::SessionDisconnected(format!("session is {state}")),
            SessionError::Disconnected(msg) => DeliveryError::SessionDisconnected(msg),
            SessionError::NoChat => DeliveryError::NotConfigured("no target chat".to_string()),
            other => DeliveryError::Transport(other.to_string()),
        }
    }
}

/// Errors raised by the session keeper and its driver.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not ready ({0})")]
    NotReady(String),

    #[error("Session disconnected: {0}")]
    Disconnected(String),

    #[error("No target chat configured")]
    NoChat,

    #[error("Bridge request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bridge error (HTTP {status}): {message}")]
    Bridge { status: u16, message: String },

    #[error("Cannot launch session bridge: {0}")]
    Launch(std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    pub fn is_critical(&self) -> bool {
        is_detached_frame(&self.to_string())
    }
}

fn is_detached_frame(msg: &str) -> bool {
    msg.to_ascii_lowercase().contains("detached frame")
}

use thiserror::Error;

/// Errors that can occur during CLI command execution.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be loaded
    #[error(transparent)]
    Settings(#[from] carnage_lib::SettingsError),

    /// Relay assembly or watch failure
    #[error(transparent)]
    Relay(#[from] carnage_lib::RelayError),

    /// Report parsing failed
    #[error(transparent)]
    Report(#[from] carnage_report::ReportError),

    /// Rendering failed
    #[error(transparent)]
    Render(#[from] carnage_render::RenderError),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Runtime creation or async error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

impl CliError {
    pub(crate) fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub(crate) fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    pub(crate) fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

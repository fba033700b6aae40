use std::time::Duration;

/// Errors that can occur while rendering a match image.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("No Chromium-compatible browser found; set [render] browser or CARNAGE_BROWSER")]
    BrowserNotFound,

    #[error("Render timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Render engine error: {0}")]
    Engine(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid image: {0}")]
    Image(#[from] image::ImageError),
}

impl RenderError {
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }
}

//! Match image rendering.
//!
//! A [`Renderer`] turns a [`MatchRecord`] into PNG bytes. The shipped
//! implementation writes an HTML post-game document and screenshots it with
//! a headless Chromium launched in a throwaway sandbox.

pub mod browser;
pub mod chromium;
pub mod document;
pub mod error;
pub mod sandbox;

pub use browser::detect_browser;
pub use chromium::{ChromiumRenderer, RenderConfig};
pub use document::match_document;
pub use error::RenderError;

use std::path::{Path, PathBuf};

use carnage_core::MatchRecord;
use futures::future::BoxFuture;

/// A rendered, decoded-and-verified PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RenderedImage {
    /// Wrap PNG bytes after checking they decode.
    pub fn from_png(png: Vec<u8>) -> Result<Self, RenderError> {
        let decoded = image::load_from_memory_with_format(&png, image::ImageFormat::Png)?;
        Ok(Self {
            width: decoded.width(),
            height: decoded.height(),
            png,
        })
    }
}

/// Trait for match image renderers.
pub trait Renderer: Send + Sync {
    fn render<'a>(&'a self, record: &'a MatchRecord) -> BoxFuture<'a, Result<RenderedImage, RenderError>>;
}

/// Write a copy of `image` to `<dir>/match_<key>.png`.
pub fn write_artifact(dir: &Path, key: &str, image: &RenderedImage) -> Result<PathBuf, RenderError> {
    std::fs::create_dir_all(dir)?;
    let safe: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let path = dir.join(format!("match_{}.png", safe));
    std::fs::write(&path, &image.png)?;
    Ok(path)
}

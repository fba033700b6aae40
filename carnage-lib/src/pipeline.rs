//! One report file through parse, dedupe, render, fan-out, record and
//! cleanup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use carnage_core::MatchRecord;
use carnage_db::{DedupeStore, MatchStore, StoreError};
use carnage_delivery::{DeliveryFanout, DeliveryReport};
use carnage_render::{RenderError, Renderer, write_artifact};
use carnage_report::ReportError;
use futures::future::BoxFuture;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    Report(#[from] ReportError),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl PipelineError {
    /// Worth retrying the same file later: the client still holds the file,
    /// or the database is busy.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Report(ReportError::Io(e)) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::PermissionDenied
            ),
            PipelineError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// A match that went all the way through.
#[derive(Debug, Clone)]
pub struct MatchSummary {
    pub match_id: String,
    pub map_name: String,
    pub delivery: DeliveryReport,
    pub artifact: Option<PathBuf>,
    pub source_removed: bool,
}

#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    Processed(MatchSummary),
    /// Already in the ledger; nothing was sent.
    Duplicate { match_id: String, source_removed: bool },
}

impl ProcessOutcome {
    pub fn match_id(&self) -> &str {
        match self {
            ProcessOutcome::Processed(s) => &s.match_id,
            ProcessOutcome::Duplicate { match_id, .. } => match_id,
        }
    }

    pub fn source_removed(&self) -> bool {
        match self {
            ProcessOutcome::Processed(s) => s.source_removed,
            ProcessOutcome::Duplicate { source_removed, .. } => *source_removed,
        }
    }
}

/// Processes one settled report file. The dispatcher only sees this trait.
pub trait MatchProcessor: Send + Sync {
    fn process<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ProcessOutcome, PipelineError>>;
}

pub struct MatchPipeline {
    renderer: Arc<dyn Renderer>,
    fanout: DeliveryFanout,
    store: Arc<MatchStore>,
    artifact_dir: Option<PathBuf>,
}

impl MatchPipeline {
    pub fn new(renderer: Arc<dyn Renderer>, fanout: DeliveryFanout, store: Arc<MatchStore>) -> Self {
        Self {
            renderer,
            fanout,
            store,
            artifact_dir: None,
        }
    }

    /// Keep a copy of every rendered image in `dir`.
    pub fn with_artifact_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.artifact_dir = dir;
        self
    }

    pub fn store(&self) -> &Arc<MatchStore> {
        &self.store
    }

    async fn run(&self, path: &Path) -> Result<ProcessOutcome, PipelineError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let raw = tokio::fs::read(path).await.map_err(ReportError::Io)?;
        let record = carnage_report::parse_report(&raw, &file_name)?;
        log::info!(
            "Parsed {} -> match {} on {} ({}, {} players)",
            file_name,
            record.match_id,
            record.map_name,
            record.mode_name,
            record.players.len()
        );

        let known_id = !record.has_unknown_id();
        if known_id && self.blocking_store(record.match_id.clone(), |s, id| s.exists(&id)).await? {
            log::info!("Match {} already processed, skipping", record.match_id);
            return Ok(ProcessOutcome::Duplicate {
                source_removed: remove_source(path).await,
                match_id: record.match_id,
            });
        }

        let image = self.renderer.render(&record).await?;
        log::info!(
            "Rendered match {} ({}x{}, {} bytes)",
            record.match_id,
            image.width,
            image.height,
            image.png.len()
        );
        let key = artifact_key(&record, path);
        let artifact = self.save_artifact(&key, &image);

        if known_id {
            let source = file_name.clone();
            self.blocking_store(record.match_id.clone(), move |s, id| {
                s.mark_processed(&id, Some(&source))
            })
            .await?;
        }

        let delivery = self.fanout.deliver(&image.png, &key, &record).await;

        if known_id {
            let webhook = delivery.status_of("webhook");
            let session = delivery.status_of("session");
            let persisted = delivery.persistence.is_persisted();
            // Delivery already happened; a ledger failure here must not trigger a re-drive.
            if let Err(e) = self
                .blocking_store(record.match_id.clone(), move |s, id| {
                    s.record_delivery(&id, webhook, session, persisted)
                })
                .await
            {
                log::warn!("Match {}: could not record delivery status: {}", record.match_id, e);
            }
        }

        Ok(ProcessOutcome::Processed(MatchSummary {
            source_removed: remove_source(path).await,
            match_id: record.match_id,
            map_name: record.map_name,
            delivery,
            artifact,
        }))
    }

    fn save_artifact(&self, key: &str, image: &carnage_render::RenderedImage) -> Option<PathBuf> {
        let dir = self.artifact_dir.as_ref()?;
        match write_artifact(dir, key, image) {
            Ok(written) => {
                log::debug!("Saved render to {}", written.display());
                Some(written)
            }
            Err(e) => {
                log::warn!("Could not save render for {}: {}", key, e);
                None
            }
        }
    }

    async fn blocking_store<T, F>(&self, match_id: String, op: F) -> Result<T, PipelineError>
    where
        T: Send + 'static,
        F: FnOnce(&MatchStore, String) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(&store, match_id))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))?
            .map_err(PipelineError::from)
    }
}

impl MatchProcessor for MatchPipeline {
    fn process<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ProcessOutcome, PipelineError>> {
        Box::pin(self.run(path))
    }
}

/// Artifact key: the match id, or the report's file stem when the id is unknown.
pub fn artifact_key(record: &MatchRecord, path: &Path) -> String {
    if record.has_unknown_id() {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| record.match_id.clone())
    } else {
        record.match_id.clone()
    }
}

/// Delete a handled report. Failure is logged, never fatal.
async fn remove_source(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            log::debug!("Removed {}", path.display());
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            log::warn!("Could not remove {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
#[path = "tests/pipeline_tests.rs"]
mod tests;

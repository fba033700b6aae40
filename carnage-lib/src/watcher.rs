//! Folder watching: turns filesystem notifications into report candidates.

use std::future::Future;
use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::dispatcher::DispatcherHandle;
use crate::filters::is_report_candidate;

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Cannot watch {path}: {source}")]
    Notify {
        path: PathBuf,
        source: notify::Error,
    },

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Report paths named by a create or modify notification.
pub fn candidate_paths(event: &Event, extension: &str) -> Vec<PathBuf> {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter(|p| is_report_candidate(p, extension))
        .cloned()
        .collect()
}

/// Reports already sitting in `dir`, oldest first.
pub fn existing_reports(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, WatchError> {
    let io_err = |source| WatchError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        if !path.is_file() || !is_report_candidate(&path, extension) {
            continue;
        }
        let modified = entry.metadata().and_then(|m| m.modified()).ok();
        found.push((modified, path));
    }
    found.sort();
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

/// Watch `dir` and hand every report candidate to `dispatcher` until
/// `shutdown` resolves.
pub async fn watch_folder(
    dir: &Path,
    extension: &str,
    process_existing: bool,
    dispatcher: &DispatcherHandle,
    shutdown: impl Future<Output = ()>,
) -> Result<(), WatchError> {
    std::fs::create_dir_all(dir).map_err(|source| WatchError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let (sender, mut receiver) = mpsc::unbounded_channel::<Result<Event, notify::Error>>();
    let notify_err = |source| WatchError::Notify {
        path: dir.to_path_buf(),
        source,
    };
    let mut watcher = notify::recommended_watcher(move |result| {
        if sender.send(result).is_err() {
            log::debug!("Folder watcher receiver dropped");
        }
    })
    .map_err(notify_err)?;
    watcher.watch(dir, RecursiveMode::NonRecursive).map_err(notify_err)?;
    log::info!("Watching {} for *.{} reports", dir.display(), extension);

    if process_existing {
        let existing = existing_reports(dir, extension)?;
        if !existing.is_empty() {
            log::info!("Queueing {} existing report(s)", existing.len());
        }
        for path in existing {
            dispatcher.submit(path);
        }
    }

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            notification = receiver.recv() => match notification {
                Some(Ok(event)) => {
                    for path in candidate_paths(&event, extension) {
                        dispatcher.submit(path);
                    }
                }
                Some(Err(e)) => log::warn!("Folder watcher error: {}", e),
                None => break,
            },
        }
    }
    log::info!("Stopped watching {}", dir.display());
    Ok(())
}

//! Waiting for the game client to finish writing a report.

use std::path::Path;
use std::time::{Duration, SystemTime};

use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum StabilizeError {
    #[error("file disappeared before it settled")]
    Vanished,

    #[error("file still changing after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    len: u64,
    modified: Option<SystemTime>,
}

async fn snapshot(path: &Path) -> Result<Snapshot, StabilizeError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Snapshot {
            len: meta.len(),
            modified: meta.modified().ok(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StabilizeError::Vanished),
        Err(e) => Err(e.into()),
    }
}

/// Wait until `path` has kept the same size and mtime for `quiet`, checking
/// every `poll`. Gives up after `max_wait`. Returns the settled size.
pub async fn wait_until_stable(
    path: &Path,
    quiet: Duration,
    poll: Duration,
    max_wait: Duration,
) -> Result<u64, StabilizeError> {
    let started = Instant::now();
    let mut last = snapshot(path).await?;
    let mut unchanged_since = Instant::now();
    loop {
        if unchanged_since.elapsed() >= quiet && last.len > 0 {
            return Ok(last.len);
        }
        if started.elapsed() >= max_wait {
            return Err(StabilizeError::Timeout(max_wait));
        }
        tokio::time::sleep(poll).await;
        let current = snapshot(path).await?;
        if current != last {
            last = current;
            unchanged_since = Instant::now();
        }
    }
}

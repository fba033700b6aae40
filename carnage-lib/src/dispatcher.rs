//! Turns file events into at most one pipeline run per report.
//!
//! The dispatcher is an actor: one task owns the set of file names in
//! flight, stabilization runs in short-lived tasks, and a single worker runs
//! the pipeline so that one match's fan-out finishes before the next starts.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};

use crate::pipeline::{MatchProcessor, PipelineError, ProcessOutcome};
use crate::settings::WatchSettings;
use crate::stabilize::{StabilizeError, wait_until_stable};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub quiet_period: Duration,
    pub poll_interval: Duration,
    pub max_stabilize: Duration,
    pub inter_match_delay: Duration,
    pub release_grace: Duration,
    pub release_grace_on_cleanup_failure: Duration,
    pub redrive_delay: Duration,
    pub max_redrives: u32,
}

impl From<&WatchSettings> for DispatcherConfig {
    fn from(w: &WatchSettings) -> Self {
        Self {
            quiet_period: w.quiet_period,
            poll_interval: w.poll_interval,
            max_stabilize: w.max_stabilize,
            inter_match_delay: w.inter_match_delay,
            release_grace: w.release_grace,
            release_grace_on_cleanup_failure: w.release_grace_on_cleanup_failure,
            redrive_delay: w.redrive_delay,
            max_redrives: w.max_redrives,
        }
    }
}

/// What happened to a submitted file.
#[derive(Debug)]
pub enum DispatchEvent {
    /// Already in flight; this trigger was dropped.
    Suppressed { path: PathBuf },
    /// Never settled (vanished or kept changing).
    Unsettled { path: PathBuf, reason: String },
    Processed { path: PathBuf, outcome: ProcessOutcome },
    Failed { path: PathBuf, error: String, will_retry: bool },
}

enum Command {
    Candidate(PathBuf),
    Redrive { path: PathBuf, attempt: u32 },
    Unsettled { path: PathBuf, error: StabilizeError },
    Finished {
        path: PathBuf,
        attempt: u32,
        result: Result<ProcessOutcome, PipelineError>,
    },
    Release(String),
    Shutdown,
}

struct Job {
    path: PathBuf,
    attempt: u32,
}

fn file_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Handle used to feed and stop a running dispatcher.
pub struct DispatcherHandle {
    tx: mpsc::UnboundedSender<Command>,
    stop: watch::Sender<bool>,
    actor: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Offer a candidate report file.
    pub fn submit(&self, path: PathBuf) {
        if self.tx.send(Command::Candidate(path)).is_err() {
            log::warn!("Dispatcher is not running; dropping file event");
        }
    }

    /// Stop accepting work. The match being processed, if any, is finished
    /// first; files still settling or waiting in the queue are left alone.
    pub async fn shutdown(self) {
        self.stop.send_replace(true);
        let _ = self.tx.send(Command::Shutdown);
        if let Err(e) = self.actor.await {
            log::warn!("Dispatcher task ended abnormally: {}", e);
        }
        if let Err(e) = self.worker.await {
            log::warn!("Dispatcher worker ended abnormally: {}", e);
        }
    }
}

pub struct Dispatcher {
    processor: Arc<dyn MatchProcessor>,
    config: DispatcherConfig,
    events: Option<mpsc::UnboundedSender<DispatchEvent>>,
}

impl Dispatcher {
    pub fn new(processor: Arc<dyn MatchProcessor>, config: DispatcherConfig) -> Self {
        Self {
            processor,
            config,
            events: None,
        }
    }

    /// Report every file's fate on `events`.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<DispatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn spawn(self) -> DispatcherHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (work_tx, work_rx) = mpsc::unbounded_channel();
        let (stop, stop_rx) = watch::channel(false);
        let worker = tokio::spawn(run_worker(
            Arc::clone(&self.processor),
            work_rx,
            tx.clone(),
            stop_rx,
            self.config.inter_match_delay,
        ));
        let actor = Actor {
            config: self.config,
            events: self.events,
            tx: tx.clone(),
            work_tx,
            in_flight: HashSet::new(),
            settling: JoinSet::new(),
        };
        let actor = tokio::spawn(actor.run(rx));
        DispatcherHandle {
            tx,
            stop,
            actor,
            worker,
        }
    }
}

async fn run_worker(
    processor: Arc<dyn MatchProcessor>,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    tx: mpsc::UnboundedSender<Command>,
    mut stop: watch::Receiver<bool>,
    inter_match_delay: Duration,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = stop.wait_for(|stopped| *stopped) => break,
            job = jobs.recv() => job,
        };
        let Some(Job { path, attempt }) = job else { break };

        log::info!("Processing {}", path.display());
        let result = processor.process(&path).await;
        if tx.send(Command::Finished { path, attempt, result }).is_err() {
            break;
        }
        // Spacing between matches keeps chat destinations under their rate limits.
        tokio::select! {
            _ = stop.wait_for(|stopped| *stopped) => break,
            _ = tokio::time::sleep(inter_match_delay) => {}
        }
    }
    if !jobs.is_empty() {
        log::info!("Dispatcher stopped with {} settled report(s) unprocessed", jobs.len());
    }
}

struct Actor {
    config: DispatcherConfig,
    events: Option<mpsc::UnboundedSender<DispatchEvent>>,
    tx: mpsc::UnboundedSender<Command>,
    work_tx: mpsc::UnboundedSender<Job>,
    in_flight: HashSet<String>,
    /// Stabilization tasks; each holds a `work_tx` clone until it settles.
    settling: JoinSet<()>,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Candidate(path) => self.on_candidate(path),
                Command::Redrive { path, attempt } => self.stabilize(path, attempt),
                Command::Unsettled { path, error } => self.on_unsettled(path, error),
                Command::Finished { path, attempt, result } => self.on_finished(path, attempt, result),
                Command::Release(key) => {
                    self.in_flight.remove(&key);
                    log::debug!("Released {}", key);
                }
                Command::Shutdown => break,
            }
        }
        self.settling.shutdown().await;
        log::debug!("Dispatcher stopped with {} file(s) in flight", self.in_flight.len());
    }

    fn emit(&self, event: DispatchEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn on_candidate(&mut self, path: PathBuf) {
        let key = file_key(&path);
        if !self.in_flight.insert(key.clone()) {
            log::debug!("{} already in flight, ignoring event", key);
            self.emit(DispatchEvent::Suppressed { path });
            return;
        }
        log::debug!("New report candidate {}", key);
        self.stabilize(path, 0);
    }

    fn stabilize(&mut self, path: PathBuf, attempt: u32) {
        while self.settling.try_join_next().is_some() {}
        let tx = self.tx.clone();
        let work_tx = self.work_tx.clone();
        let (quiet, poll, max) = (
            self.config.quiet_period,
            self.config.poll_interval,
            self.config.max_stabilize,
        );
        self.settling.spawn(async move {
            match wait_until_stable(&path, quiet, poll, max).await {
                Ok(len) => {
                    log::debug!("{} settled at {} bytes", path.display(), len);
                    let _ = work_tx.send(Job { path, attempt });
                }
                Err(error) => {
                    let _ = tx.send(Command::Unsettled { path, error });
                }
            }
        });
    }

    fn release_after(&self, key: String, grace: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = tx.send(Command::Release(key));
        });
    }

    fn on_unsettled(&mut self, path: PathBuf, error: StabilizeError) {
        let key = file_key(&path);
        let reason = error.to_string();
        match error {
            StabilizeError::Vanished => {
                log::debug!("{} vanished before settling", key);
                self.in_flight.remove(&key);
            }
            _ => {
                log::warn!("{} did not settle: {}", key, reason);
                self.release_after(key, self.config.release_grace);
            }
        }
        self.emit(DispatchEvent::Unsettled { path, reason });
    }

    fn on_finished(&mut self, path: PathBuf, attempt: u32, result: Result<ProcessOutcome, PipelineError>) {
        let key = file_key(&path);
        match result {
            Ok(outcome) => {
                match &outcome {
                    ProcessOutcome::Processed(summary) => {
                        log::info!("Match {} from {} done", summary.match_id, key)
                    }
                    ProcessOutcome::Duplicate { match_id, .. } => {
                        log::info!("Match {} from {} was a duplicate", match_id, key)
                    }
                }
                let grace = if outcome.source_removed() {
                    self.config.release_grace
                } else {
                    self.config.release_grace_on_cleanup_failure
                };
                self.release_after(key, grace);
                self.emit(DispatchEvent::Processed { path, outcome });
            }
            Err(e) if e.is_transient() && attempt < self.config.max_redrives => {
                log::warn!(
                    "{} failed ({}), retrying in {}s (retry {}/{})",
                    key,
                    e,
                    self.config.redrive_delay.as_secs(),
                    attempt + 1,
                    self.config.max_redrives
                );
                let tx = self.tx.clone();
                let delay = self.config.redrive_delay;
                let retry_path = path.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(Command::Redrive {
                        path: retry_path,
                        attempt: attempt + 1,
                    });
                });
                self.emit(DispatchEvent::Failed {
                    path,
                    error: e.to_string(),
                    will_retry: true,
                });
            }
            Err(e) => {
                log::error!("{} failed: {} (file left in place)", key, e);
                self.release_after(key, self.config.release_grace);
                self.emit(DispatchEvent::Failed {
                    path,
                    error: e.to_string(),
                    will_retry: false,
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;

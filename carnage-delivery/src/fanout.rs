//! Concurrent delivery of one rendered match to every destination, plus the
//! persistence write.

use std::sync::Arc;

use carnage_core::MatchRecord;
use carnage_db::MatchStore;
use serde::Serialize;

use crate::backoff::RetryPolicy;
use crate::destination::{Destination, Readiness};
use crate::error::DeliveryError;
use crate::summary::attachment_name;

/// Final result for one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DestinationOutcome {
    Delivered { attempts: u32 },
    /// The image failed but the text table went through.
    DeliveredFallback { attempts: u32, cause: String },
    Skipped { reason: String },
    Failed { attempts: u32, error: String },
}

impl DestinationOutcome {
    /// Short status stored in the processing ledger.
    pub fn status_str(&self) -> &'static str {
        match self {
            DestinationOutcome::Delivered { .. } => "delivered",
            DestinationOutcome::DeliveredFallback { .. } => "fallback",
            DestinationOutcome::Skipped { .. } => "skipped",
            DestinationOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(
            self,
            DestinationOutcome::Delivered { .. } | DestinationOutcome::DeliveredFallback { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistOutcome {
    Persisted { players: usize },
    Skipped { reason: String },
    Failed { error: String },
}

impl PersistOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, PersistOutcome::Persisted { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub match_id: String,
    pub destinations: Vec<(String, DestinationOutcome)>,
    pub persistence: PersistOutcome,
}

impl DeliveryReport {
    pub fn outcome(&self, name: &str) -> Option<&DestinationOutcome> {
        self.destinations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, outcome)| outcome)
    }

    /// Ledger status for a destination; unregistered destinations are skipped.
    pub fn status_of(&self, name: &str) -> &'static str {
        self.outcome(name).map_or("skipped", DestinationOutcome::status_str)
    }
}

/// Sends one match to all destinations independently.
pub struct DeliveryFanout {
    destinations: Vec<Arc<dyn Destination>>,
    store: Option<Arc<MatchStore>>,
    policy: RetryPolicy,
}

impl DeliveryFanout {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            destinations: Vec::new(),
            store: None,
            policy,
        }
    }

    pub fn with_destination(mut self, destination: Arc<dyn Destination>) -> Self {
        self.destinations.push(destination);
        self
    }

    pub fn with_store(mut self, store: Arc<MatchStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn destination_names(&self) -> Vec<&str> {
        self.destinations.iter().map(|d| d.name()).collect()
    }

    /// Deliver to every destination and persist the match, all concurrently.
    /// One destination failing never affects the others or the store write.
    ///
    /// `key` names the image attachment: the match id, or the report's file
    /// stem when the id is unknown.
    pub async fn deliver(&self, png: &[u8], key: &str, record: &MatchRecord) -> DeliveryReport {
        let file_name = attachment_name(key);
        let sends = futures::future::join_all(
            self.destinations
                .iter()
                .map(|d| deliver_one(d.as_ref(), png, &file_name, record, &self.policy)),
        );
        let (outcomes, persistence) = tokio::join!(sends, self.persist(record));

        let destinations: Vec<(String, DestinationOutcome)> = self
            .destinations
            .iter()
            .map(|d| d.name().to_string())
            .zip(outcomes)
            .collect();
        for (name, outcome) in &destinations {
            log::info!("Match {}: {} {}", record.match_id, name, outcome.status_str());
        }
        DeliveryReport {
            match_id: record.match_id.clone(),
            destinations,
            persistence,
        }
    }

    async fn persist(&self, record: &MatchRecord) -> PersistOutcome {
        let Some(store) = &self.store else {
            return PersistOutcome::Skipped {
                reason: "no store".to_string(),
            };
        };
        if record.has_unknown_id() {
            return PersistOutcome::Skipped {
                reason: "match has no unique id".to_string(),
            };
        }
        let store = Arc::clone(store);
        let record = record.clone();
        let result = tokio::task::spawn_blocking(move || {
            store.upsert_game(&record)?;
            store.upsert_players(&record.match_id, &record.players)
        })
        .await;
        match result {
            Ok(Ok(players)) => PersistOutcome::Persisted { players },
            Ok(Err(e)) => {
                log::error!("Persisting match failed: {}", e);
                PersistOutcome::Failed { error: e.to_string() }
            }
            Err(e) => PersistOutcome::Failed { error: e.to_string() },
        }
    }
}

async fn deliver_one(
    dest: &dyn Destination,
    png: &[u8],
    file_name: &str,
    record: &MatchRecord,
    policy: &RetryPolicy,
) -> DestinationOutcome {
    match dest.readiness() {
        Readiness::Skip(reason) => {
            log::debug!("{}: skipped ({})", dest.name(), reason);
            return DestinationOutcome::Skipped { reason };
        }
        Readiness::NotReady(reason) => {
            log::warn!("{}: not ready ({}), trying text fallback", dest.name(), reason);
            return match dest.send_fallback(record).await {
                Ok(()) => DestinationOutcome::DeliveredFallback {
                    attempts: 0,
                    cause: reason,
                },
                Err(e) => DestinationOutcome::Failed {
                    attempts: 0,
                    error: e.to_string(),
                },
            };
        }
        Readiness::Ready => {}
    }

    let mut attempts = 0;
    let mut last_error: Option<DeliveryError> = None;
    while attempts < policy.attempts() {
        if attempts > 0 {
            tokio::time::sleep(policy.delay_for(attempts)).await;
            if let Readiness::NotReady(reason) | Readiness::Skip(reason) = dest.readiness() {
                log::warn!("{}: became unavailable ({}), giving up", dest.name(), reason);
                break;
            }
        }
        attempts += 1;

        let error = match dest.send_image(png, file_name, record).await {
            Ok(()) => return DestinationOutcome::Delivered { attempts },
            Err(e) => e,
        };
        log::warn!("{}: attempt {} failed: {}", dest.name(), attempts, error);

        match error {
            DeliveryError::Transport(_) => match dest.send_fallback(record).await {
                Ok(()) => {
                    return DestinationOutcome::DeliveredFallback {
                        attempts,
                        cause: error.to_string(),
                    };
                }
                Err(fallback) => {
                    log::warn!("{}: text fallback failed: {}", dest.name(), fallback);
                    last_error = Some(error);
                }
            },
            DeliveryError::SessionDisconnected(_) | DeliveryError::NotConfigured(_) => {
                last_error = Some(error);
                break;
            }
        }
    }

    let error = last_error.unwrap_or_else(|| DeliveryError::SessionDisconnected("destination unavailable".to_string()));
    dest.on_exhausted(&error);
    log::error!("{}: delivery of match {} failed: {}", dest.name(), record.match_id, error);
    DestinationOutcome::Failed {
        attempts,
        error: error.to_string(),
    }
}

#[cfg(test)]
#[path = "tests/fanout_tests.rs"]
mod tests;

//! Wiring: builds every component from resolved [`Settings`] and runs them.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use carnage_db::{MatchStore, StoreError};
use carnage_delivery::{
    BridgeConfig, BridgeDriver, DeliveryError, DeliveryFanout, Destination, SessionConfig, SessionDestination,
    SessionError, SessionKeeper, SessionState, WebhookClient, WebhookDestination,
};
use carnage_render::{ChromiumRenderer, RenderConfig, RenderError, Renderer};

use crate::control::{self, ControlState};
use crate::dispatcher::{Dispatcher, DispatcherConfig};
use crate::pipeline::{MatchPipeline, MatchProcessor, PipelineError, ProcessOutcome};
use crate::settings::Settings;
use crate::watcher::{self, WatchError};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Cannot open match database: {0}")]
    Store(#[from] StoreError),

    #[error("Renderer unavailable: {0}")]
    Render(#[from] RenderError),

    #[error("Webhook client: {0}")]
    Webhook(#[from] DeliveryError),

    #[error("Session driver: {0}")]
    Session(#[from] SessionError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

pub type SessionHandle = SessionKeeper<BridgeDriver>;

/// A fully assembled relay.
pub struct Relay {
    settings: Settings,
    store: Arc<MatchStore>,
    webhook: Arc<WebhookClient>,
    session: Option<SessionHandle>,
    pipeline: Arc<MatchPipeline>,
}

impl Relay {
    /// Build the relay with the headless Chromium renderer.
    pub fn build(settings: Settings) -> Result<Self, RelayError> {
        let renderer = ChromiumRenderer::new(RenderConfig {
            browser: settings.render.browser.clone(),
            sandbox_root: settings.render.sandbox_root.clone(),
            timeout: settings.render.timeout,
            width: settings.render.width,
            height: settings.render.height,
        })?;
        Self::assemble(settings, Arc::new(renderer))
    }

    /// Build the relay around any renderer.
    pub fn assemble(settings: Settings, renderer: Arc<dyn Renderer>) -> Result<Self, RelayError> {
        let store = Arc::new(MatchStore::open(&settings.database_path)?);
        let webhook = Arc::new(WebhookClient::new(
            settings.webhook.url.clone(),
            settings.webhook.timeout,
        )?);

        let session = if settings.session.enabled {
            let s = &settings.session;
            let driver = BridgeDriver::new(BridgeConfig {
                base_url: s.bridge_url.clone(),
                command: s.bridge_command.clone(),
                request_timeout: s.request_timeout,
            })?;
            let mut config = SessionConfig::new(&s.profile_dir);
            config.chat_id = s.chat_id.clone();
            config.handshake_timeout = s.handshake_timeout;
            config.probe_interval = s.probe_interval;
            config.restart_delay = s.restart_delay;
            Some(SessionKeeper::new(driver, config))
        } else {
            log::info!("Chat session disabled");
            None
        };

        let mut fanout = DeliveryFanout::new(settings.retry)
            .with_destination(Arc::new(WebhookDestination::new(Arc::clone(&webhook))) as Arc<dyn Destination>);
        if let Some(keeper) = &session {
            fanout = fanout.with_destination(Arc::new(SessionDestination::new(keeper.clone())));
        }
        let fanout = fanout.with_store(Arc::clone(&store));

        let pipeline = MatchPipeline::new(renderer, fanout, Arc::clone(&store))
            .with_artifact_dir(settings.render.output_dir.clone());

        Ok(Self {
            settings,
            store,
            webhook,
            session,
            pipeline: Arc::new(pipeline),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<MatchStore> {
        &self.store
    }

    pub fn webhook(&self) -> &Arc<WebhookClient> {
        &self.webhook
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    /// Launch the chat session and log its state changes, including the
    /// login code the operator has to scan.
    pub async fn start_session(&self) {
        let Some(keeper) = &self.session else {
            return;
        };
        let mut states = keeper.subscribe();
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let state = states.borrow_and_update().clone();
                match &state {
                    SessionState::AwaitingHandshake { code: Some(code) } => {
                        log::info!("Link the chat session with this code: {}", code)
                    }
                    SessionState::Degraded { reason } => log::warn!("Chat session degraded: {}", reason),
                    other => log::info!("Chat session {}", other.label()),
                }
                if state == SessionState::Terminated {
                    break;
                }
            }
        });
        if let Err(e) = keeper.initialize().await {
            log::warn!("Chat session failed to start: {}", e);
        }
    }

    /// Run `files` through the pipeline in order, pausing between matches.
    pub async fn process_files(&self, files: &[PathBuf]) -> Vec<(PathBuf, Result<ProcessOutcome, PipelineError>)> {
        let mut results = Vec::with_capacity(files.len());
        for (i, path) in files.iter().enumerate() {
            let result = self.pipeline.process(path).await;
            results.push((path.clone(), result));
            if i + 1 < files.len() {
                tokio::time::sleep(self.settings.watch.inter_match_delay).await;
            }
        }
        results
    }

    /// Watch the report folder, and serve the control surface when
    /// configured, until `shutdown` resolves.
    pub async fn watch(&self, shutdown: impl Future<Output = ()>) -> Result<(), RelayError> {
        let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);

        let server = self.settings.control.addr.map(|addr| {
            let state = ControlState {
                session: self.session.clone(),
                webhook: Arc::clone(&self.webhook),
                store: Arc::clone(&self.store),
                api_key: self.settings.control.api_key.as_deref().map(Arc::from),
            };
            let mut stop = stop_rx.clone();
            tokio::spawn(async move {
                let stopped = async move {
                    let _ = stop.wait_for(|v| *v).await;
                };
                if let Err(e) = control::serve(addr, state, stopped).await {
                    log::error!("Control server failed: {}", e);
                }
            })
        });

        let processor = Arc::clone(&self.pipeline) as Arc<dyn MatchProcessor>;
        let dispatcher = Dispatcher::new(processor, DispatcherConfig::from(&self.settings.watch)).spawn();
        let watch = &self.settings.watch;
        let result = watcher::watch_folder(
            &watch.dir,
            &watch.extension,
            watch.process_existing,
            &dispatcher,
            shutdown,
        )
        .await;

        let _ = stop_tx.send(true);
        dispatcher.shutdown().await;
        if let Some(server) = server {
            let _ = server.await;
        }
        result.map_err(RelayError::from)
    }

    pub async fn shutdown(&self) {
        if let Some(keeper) = &self.session {
            keeper.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Overrides;
    use carnage_core::MatchRecord;
    use carnage_render::RenderedImage;
    use futures::future::BoxFuture;

    struct StaticRenderer;

    impl Renderer for StaticRenderer {
        fn render<'a>(&'a self, _record: &'a MatchRecord) -> BoxFuture<'a, Result<RenderedImage, RenderError>> {
            Box::pin(async {
                Ok(RenderedImage {
                    png: b"png".to_vec(),
                    width: 1,
                    height: 1,
                })
            })
        }
    }

    fn settings(dir: &std::path::Path) -> Settings {
        let config = dir.join("config.toml");
        std::fs::write(
            &config,
            format!(
                "[watch]\ndir = {:?}\ninter_match_delay_ms = 2000\n\n[session]\nenabled = false\n\n[database]\npath = {:?}\n",
                dir.join("reports"),
                dir.join("matches.db")
            ),
        )
        .unwrap();
        Settings::load_with_env(Some(&config), &Overrides::default(), &|_| None).unwrap()
    }

    fn report(id: &str) -> String {
        format!(
            r#"<MultiplayerCarnageReport>
  <GameUniqueId GameUniqueId="{id}"/>
  <Players>
    <Player mGamertagText="Alpha" mTeamId="0" Score="3"/>
  </Players>
</MultiplayerCarnageReport>"#
        )
    }

    #[tokio::test(start_paused = true)]
    async fn process_files_pauses_only_between_matches() {
        let dir = tempfile::tempdir().unwrap();
        let relay = Relay::assemble(settings(dir.path()), Arc::new(StaticRenderer)).unwrap();
        assert!(relay.session().is_none());

        let files: Vec<PathBuf> = ["1", "2"]
            .iter()
            .map(|id| {
                let path = dir.path().join(format!("mpcarnagereport{id}.xml"));
                std::fs::write(&path, report(id)).unwrap();
                path
            })
            .collect();

        let started = tokio::time::Instant::now();
        let results = relay.process_files(&files).await;
        let elapsed = started.elapsed();
        assert!(elapsed >= std::time::Duration::from_secs(2));
        assert!(elapsed < std::time::Duration::from_secs(4));
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(relay.store().stats().unwrap().processed, 2);
    }
}

//! Lifecycle owner of the long-lived chat session.
//!
//! ```text
//! uninitialized -> awaiting_handshake -> ready
//!                        |                 |  probe fails / client disconnects
//!                        v                 v
//!                    degraded <------- restarting -> awaiting_handshake
//!                        |
//!                        +--> ready | awaiting_handshake   (recovery loop)
//! ```
//!
//! A degraded session keeps polling the client with backoff: a late login
//! brings it to `ready`, and an unreachable client is relaunched. Any state
//! moves to `terminated` on [`SessionKeeper::shutdown`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::driver::{ChatInfo, DriverState, SessionDriver};
use super::lockfiles::cleanup_lock_files;
use crate::error::SessionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    /// Waiting for the operator to complete the login handshake.
    AwaitingHandshake { code: Option<String> },
    Ready,
    /// No working session; recovery keeps retrying in the background.
    Degraded { reason: String },
    Restarting,
    Terminated,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::AwaitingHandshake { .. } => "awaiting_handshake",
            SessionState::Ready => "ready",
            SessionState::Degraded { .. } => "degraded",
            SessionState::Restarting => "restarting",
            SessionState::Terminated => "terminated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Profile directory of the chat client. Never shared with the renderer.
    pub profile_dir: PathBuf,
    pub chat_id: Option<String>,
    pub handshake_timeout: Duration,
    pub probe_interval: Duration,
    pub restart_delay: Duration,
    pub status_poll: Duration,
}

impl SessionConfig {
    pub fn new(profile_dir: impl Into<PathBuf>) -> Self {
        Self {
            profile_dir: profile_dir.into(),
            chat_id: None,
            handshake_timeout: Duration::from_secs(180),
            probe_interval: Duration::from_secs(300),
            restart_delay: Duration::from_secs(5),
            status_poll: Duration::from_secs(1),
        }
    }
}

/// Point-in-time view of the session for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub ready: bool,
    pub chat_id: Option<String>,
}

struct Inner<D> {
    driver: D,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    chat_id: RwLock<Option<String>>,
    restarting: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Kept apart from `tasks`: a restart aborts those, and must not abort itself.
    restart_task: Mutex<Option<JoinHandle<()>>>,
}

impl<D: SessionDriver> Inner<D> {
    fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Ready)
    }

    fn is_terminated(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Terminated)
    }

    /// Move to `next` unless the session has been terminated.
    fn transition(&self, next: SessionState) {
        self.state.send_if_modified(|state| {
            if *state == SessionState::Terminated || *state == next {
                return false;
            }
            log::info!("Session {} -> {}", state.label(), next.label());
            *state = next;
            true
        });
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
        // Checked under the lock so shutdown cannot miss a task registered late.
        if self.is_terminated() {
            handle.abort();
            return;
        }
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    fn take_tasks(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|p| p.into_inner()))
    }

    fn abort_tasks(&self) {
        for task in self.take_tasks() {
            task.abort();
        }
    }

    /// Abort every background task, including a restart in progress, and
    /// wait until none of them can touch the driver again.
    async fn stop_tasks(&self) {
        let mut tasks = self.take_tasks();
        if let Some(restart) = self.restart_task.lock().unwrap_or_else(|p| p.into_inner()).take() {
            tasks.push(restart);
        }
        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            let _ = task.await;
        }
    }

    /// Clean stale locks and start the client. A launch that completes after
    /// shutdown is undone immediately.
    async fn launch(&self) -> Result<(), SessionError> {
        let removed = cleanup_lock_files(&self.config.profile_dir);
        if removed > 0 {
            log::info!("Removed {} stale lock file(s) from session profile", removed);
        }
        self.driver.launch(&self.config.profile_dir).await?;
        if self.is_terminated() {
            log::debug!("Session terminated during launch; stopping the client again");
            if let Err(e) = self.driver.shutdown().await {
                log::warn!("Session shutdown after late launch: {}", e);
            }
            return Err(SessionError::NotReady(SessionState::Terminated.label().to_string()));
        }
        Ok(())
    }

    /// Enter `degraded` and start recovering. `client_up` says whether the
    /// client is still running and worth polling before a relaunch.
    fn degrade(self: &Arc<Self>, reason: String, client_up: bool) {
        self.transition(SessionState::Degraded { reason });
        if !self.is_terminated() {
            spawn_recovery(Arc::clone(self), client_up);
        }
    }

    /// Ping plus a connection-state check. Errors carry a reason string.
    async fn probe(&self) -> Result<(), String> {
        self.driver.ping().await.map_err(|e| e.to_string())?;
        match self.driver.status().await {
            Ok(status) if status.state == DriverState::Connected => Ok(()),
            Ok(status) => Err(format!("client reports {:?}", status.state)),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Owns the chat session and keeps it alive. Cheap to clone.
pub struct SessionKeeper<D> {
    inner: Arc<Inner<D>>,
}

impl<D> Clone for SessionKeeper<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: SessionDriver> SessionKeeper<D> {
    pub fn new(driver: D, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        let chat_id = RwLock::new(config.chat_id.clone());
        Self {
            inner: Arc::new(Inner {
                driver,
                config,
                state,
                chat_id,
                restarting: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
                restart_task: Mutex::new(None),
            }),
        }
    }

    /// Clean stale profile locks, launch the client and start waiting for the
    /// handshake in the background.
    pub async fn initialize(&self) -> Result<(), SessionError> {
        if let Err(e) = self.inner.launch().await {
            self.inner.degrade(e.to_string(), false);
            return Err(e);
        }
        self.inner.transition(SessionState::AwaitingHandshake { code: None });
        spawn_handshake(Arc::clone(&self.inner));
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.inner.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    /// Login code to show the operator while awaiting the handshake.
    pub fn handshake_code(&self) -> Option<String> {
        match &*self.inner.state.borrow() {
            SessionState::AwaitingHandshake { code } => code.clone(),
            _ => None,
        }
    }

    pub fn chat_id(&self) -> Option<String> {
        self.inner.chat_id.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn set_chat_id(&self, chat_id: Option<String>) {
        let chat_id = chat_id.filter(|c| !c.trim().is_empty());
        log::info!("Session target chat set to {:?}", chat_id);
        *self.inner.chat_id.write().unwrap_or_else(|p| p.into_inner()) = chat_id;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state();
        SessionSnapshot {
            ready: state == SessionState::Ready,
            state,
            chat_id: self.chat_id(),
        }
    }

    /// Tear the session down and bring it back in the background. A restart
    /// already in progress absorbs the request.
    pub fn request_restart(&self, reason: impl Into<String>) {
        spawn_restart(Arc::clone(&self.inner), reason.into());
    }

    fn ready_chat(&self) -> Result<String, SessionError> {
        let chat = self.chat_id().ok_or(SessionError::NoChat)?;
        if !self.is_ready() {
            return Err(SessionError::NotReady(self.state().label().to_string()));
        }
        Ok(chat)
    }

    /// Re-check connectivity right before a send; a failed check schedules a
    /// restart.
    async fn confirm_connected(&self) -> Result<(), SessionError> {
        if let Err(reason) = self.inner.probe().await {
            log::warn!("Session probe before send failed: {}", reason);
            self.request_restart(reason.clone());
            return Err(SessionError::Disconnected(reason));
        }
        Ok(())
    }

    pub async fn send_image(&self, png: &[u8], caption: &str) -> Result<(), SessionError> {
        let chat = self.ready_chat()?;
        self.confirm_connected().await?;
        self.inner.driver.send_media(&chat, png, caption).await
    }

    pub async fn send_text(&self, text: &str) -> Result<(), SessionError> {
        let chat = self.ready_chat()?;
        self.confirm_connected().await?;
        self.inner.driver.send_text(&chat, text).await
    }

    pub async fn list_chats(&self) -> Result<Vec<ChatInfo>, SessionError> {
        if !self.is_ready() {
            return Err(SessionError::NotReady(self.state().label().to_string()));
        }
        self.inner.driver.list_chats().await
    }

    /// Stop background tasks and the client. Terminal.
    pub async fn shutdown(&self) {
        {
            // Same lock as `track`, so no task can be registered after this point.
            let _tasks = self.inner.tasks.lock().unwrap_or_else(|p| p.into_inner());
            self.inner.state.send_replace(SessionState::Terminated);
        }
        self.inner.stop_tasks().await;
        if let Err(e) = self.inner.driver.shutdown().await {
            log::warn!("Session shutdown: {}", e);
        }
        log::info!("Session terminated");
    }
}

fn spawn_handshake<D: SessionDriver>(inner: Arc<Inner<D>>) {
    let handle = tokio::spawn(watch_handshake(Arc::clone(&inner)));
    inner.track(handle);
}

fn spawn_probe<D: SessionDriver>(inner: Arc<Inner<D>>) {
    let handle = tokio::spawn(probe_loop(Arc::clone(&inner)));
    inner.track(handle);
}

fn spawn_recovery<D: SessionDriver>(inner: Arc<Inner<D>>, client_up: bool) {
    let handle = tokio::spawn(recover(Arc::clone(&inner), client_up));
    inner.track(handle);
}

fn spawn_restart<D: SessionDriver>(inner: Arc<Inner<D>>, reason: String) {
    if inner.is_terminated() || inner.restarting.swap(true, Ordering::SeqCst) {
        return;
    }
    let mut slot = inner.restart_task.lock().unwrap_or_else(|p| p.into_inner());
    if inner.is_terminated() {
        inner.restarting.store(false, Ordering::SeqCst);
        return;
    }
    *slot = Some(tokio::spawn(restart(Arc::clone(&inner), reason)));
}

async fn watch_handshake<D: SessionDriver>(inner: Arc<Inner<D>>) {
    let deadline = Instant::now() + inner.config.handshake_timeout;
    loop {
        match inner.driver.status().await {
            Ok(status) => match status.state {
                DriverState::Connected => {
                    inner.transition(SessionState::Ready);
                    spawn_probe(Arc::clone(&inner));
                    return;
                }
                DriverState::Qr => {
                    let fresh = status.qr.is_some()
                        && !matches!(&*inner.state.borrow(),
                            SessionState::AwaitingHandshake { code } if *code == status.qr);
                    if fresh {
                        log::info!("Session handshake code available; scan it to log in");
                        inner.transition(SessionState::AwaitingHandshake { code: status.qr });
                    }
                }
                DriverState::AuthFailure => {
                    inner.degrade("authentication failed".to_string(), false);
                    return;
                }
                _ => {}
            },
            Err(e) => log::debug!("Session status poll failed: {}", e),
        }
        if Instant::now() >= deadline {
            inner.degrade(
                format!(
                    "handshake not completed within {}s",
                    inner.config.handshake_timeout.as_secs()
                ),
                true,
            );
            return;
        }
        tokio::time::sleep(inner.config.status_poll).await;
    }
}

async fn probe_loop<D: SessionDriver>(inner: Arc<Inner<D>>) {
    let mut ticker = tokio::time::interval(inner.config.probe_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if !inner.is_ready() {
            return;
        }
        match inner.probe().await {
            Ok(()) => log::debug!("Session liveness probe ok"),
            Err(reason) => {
                log::warn!("Session liveness probe failed: {}", reason);
                spawn_restart(Arc::clone(&inner), reason);
                return;
            }
        }
    }
}

/// Runs while degraded. The client stays up across a handshake timeout, so a
/// late login is picked up here. A client that is gone, refused, or stuck
/// starting for longer than the handshake timeout is relaunched. Retries back
/// off from `restart_delay` up to `probe_interval`.
async fn recover<D: SessionDriver>(inner: Arc<Inner<D>>, client_up: bool) {
    let cap = inner.config.probe_interval.max(inner.config.restart_delay);
    let mut delay = inner.config.restart_delay;
    let mut needs_launch = !client_up;
    let mut waiting_since = Instant::now();
    loop {
        tokio::time::sleep(delay).await;
        delay = delay.saturating_mul(2).min(cap);
        if inner.is_terminated() {
            return;
        }

        if !needs_launch {
            match inner.driver.status().await {
                Ok(status) => match status.state {
                    DriverState::Connected => {
                        log::info!("Session connected while degraded");
                        inner.transition(SessionState::Ready);
                        spawn_probe(Arc::clone(&inner));
                        return;
                    }
                    DriverState::Disconnected | DriverState::AuthFailure => {
                        log::info!("Degraded session client reports {:?}", status.state);
                        needs_launch = true;
                    }
                    DriverState::Qr => waiting_since = Instant::now(),
                    DriverState::Starting | DriverState::Unknown => {
                        needs_launch = waiting_since.elapsed() >= inner.config.handshake_timeout;
                    }
                },
                Err(e) => {
                    log::info!("Degraded session client unreachable: {}", e);
                    needs_launch = true;
                }
            }
            if !needs_launch {
                continue;
            }
        }

        if let Err(e) = inner.driver.shutdown().await {
            log::debug!("Session shutdown before relaunch: {}", e);
        }
        match inner.launch().await {
            Ok(()) => {
                inner.transition(SessionState::AwaitingHandshake { code: None });
                spawn_handshake(Arc::clone(&inner));
                return;
            }
            Err(e) => {
                log::warn!("Session relaunch failed: {}", e);
                waiting_since = Instant::now();
            }
        }
    }
}

async fn restart<D: SessionDriver>(inner: Arc<Inner<D>>, reason: String) {
    log::warn!("Restarting session: {}", reason);
    inner.transition(SessionState::Restarting);
    inner.abort_tasks();
    if let Err(e) = inner.driver.shutdown().await {
        log::warn!("Session shutdown during restart: {}", e);
    }
    tokio::time::sleep(inner.config.restart_delay).await;

    if !inner.is_terminated() {
        match inner.launch().await {
            Ok(()) => {
                inner.transition(SessionState::AwaitingHandshake { code: None });
                spawn_handshake(Arc::clone(&inner));
            }
            Err(e) => {
                log::error!("Session relaunch failed: {}", e);
                inner.degrade(e.to_string(), false);
            }
        }
    }
    inner.restarting.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_snake_case() {
        assert_eq!(SessionState::AwaitingHandshake { code: None }.label(), "awaiting_handshake");
        assert_eq!(
            serde_json::to_value(SessionState::Degraded { reason: "x".into() }).unwrap(),
            serde_json::json!({ "state": "degraded", "reason": "x" })
        );
    }
}

//! Application settings.
//!
//! Settings live in `~/.config/carnage-relay/config.toml`. Every field is
//! optional. Each value is resolved with a priority chain:
//!
//! 1. CLI override
//! 2. Environment variable (`CARNAGE_*`)
//! 3. Config file
//! 4. Built-in default

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use carnage_delivery::RetryPolicy;
use serde::Deserialize;

pub const ENV_WATCH_DIR: &str = "CARNAGE_WATCH_DIR";
pub const ENV_WEBHOOK_URL: &str = "CARNAGE_WEBHOOK_URL";
pub const ENV_SESSION_CHAT: &str = "CARNAGE_SESSION_CHAT";
pub const ENV_DB_PATH: &str = "CARNAGE_DB_PATH";
pub const ENV_BROWSER: &str = "CARNAGE_BROWSER";
pub const ENV_API_KEY: &str = "CARNAGE_API_KEY";

const APP_DIR: &str = "carnage-relay";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Canonical path to the config file: `~/.config/carnage-relay/config.toml`.
pub fn config_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join(APP_DIR).join("config.toml")
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// The game client's report folder when present, else a local folder.
fn default_watch_dir() -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        let mcc = home
            .join("AppData")
            .join("LocalLow")
            .join("MCC")
            .join("Temporary");
        if mcc.is_dir() {
            return mcc;
        }
    }
    PathBuf::from("Maps_to_Rename")
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingSource {
    Cli,
    Env(&'static str),
    File,
    Default,
}

impl fmt::Display for SettingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingSource::Cli => write!(f, "command line"),
            SettingSource::Env(var) => write!(f, "env: {}", var),
            SettingSource::File => write!(f, "config file"),
            SettingSource::Default => write!(f, "default"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub dir: PathBuf,
    pub extension: String,
    pub quiet_period: Duration,
    pub poll_interval: Duration,
    pub max_stabilize: Duration,
    pub inter_match_delay: Duration,
    pub release_grace: Duration,
    pub release_grace_on_cleanup_failure: Duration,
    pub redrive_delay: Duration,
    pub max_redrives: u32,
    pub process_existing: bool,
}

#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub url: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub enabled: bool,
    pub bridge_url: String,
    pub bridge_command: Option<Vec<String>>,
    pub profile_dir: PathBuf,
    pub chat_id: Option<String>,
    pub handshake_timeout: Duration,
    pub probe_interval: Duration,
    pub restart_delay: Duration,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub browser: Option<PathBuf>,
    pub sandbox_root: PathBuf,
    pub timeout: Duration,
    pub width: u32,
    pub height: u32,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ControlSettings {
    pub addr: Option<SocketAddr>,
    pub api_key: Option<String>,
}

/// Fully resolved settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub watch: WatchSettings,
    pub webhook: WebhookSettings,
    pub session: SessionSettings,
    pub render: RenderSettings,
    pub retry: RetryPolicy,
    pub database_path: PathBuf,
    pub control: ControlSettings,
    /// Source of each overridable value, keyed by `section.field`.
    pub sources: BTreeMap<&'static str, SettingSource>,
    /// The config file that was read, if any.
    pub file: Option<PathBuf>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub watch_dir: Option<PathBuf>,
    pub process_existing: bool,
    pub no_session: bool,
    pub control_addr: Option<SocketAddr>,
}

// -- file layout --

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    watch: FileWatch,
    webhook: FileWebhook,
    session: FileSession,
    render: FileRender,
    retry: FileRetry,
    database: FileDatabase,
    control: FileControl,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileWatch {
    dir: Option<PathBuf>,
    extension: Option<String>,
    quiet_period_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    max_stabilize_secs: Option<u64>,
    inter_match_delay_ms: Option<u64>,
    release_grace_ms: Option<u64>,
    release_grace_on_cleanup_failure_ms: Option<u64>,
    redrive_delay_ms: Option<u64>,
    max_redrives: Option<u32>,
    process_existing: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileWebhook {
    url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileSession {
    enabled: Option<bool>,
    bridge_url: Option<String>,
    bridge_command: Option<Vec<String>>,
    profile_dir: Option<PathBuf>,
    chat_id: Option<String>,
    handshake_timeout_secs: Option<u64>,
    probe_interval_secs: Option<u64>,
    restart_delay_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileRender {
    browser: Option<PathBuf>,
    sandbox_root: Option<PathBuf>,
    timeout_secs: Option<u64>,
    width: Option<u32>,
    height: Option<u32>,
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileRetry {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileDatabase {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileControl {
    addr: Option<String>,
    api_key: Option<String>,
}

fn millis(v: Option<u64>, default: u64) -> Duration {
    Duration::from_millis(v.unwrap_or(default))
}

fn secs(v: Option<u64>, default: u64) -> Duration {
    Duration::from_secs(v.unwrap_or(default))
}

/// Resolves one field through the priority chain, recording its source.
struct Resolver<'a> {
    env: &'a dyn Fn(&str) -> Option<String>,
    sources: BTreeMap<&'static str, SettingSource>,
}

impl Resolver<'_> {
    fn pick<T>(
        &mut self,
        key: &'static str,
        cli: Option<T>,
        env_var: &'static str,
        parse_env: impl FnOnce(String) -> T,
        file: Option<T>,
    ) -> Option<T> {
        if let Some(v) = cli {
            self.sources.insert(key, SettingSource::Cli);
            return Some(v);
        }
        if let Some(raw) = (self.env)(env_var).filter(|v| !v.trim().is_empty()) {
            self.sources.insert(key, SettingSource::Env(env_var));
            return Some(parse_env(raw));
        }
        if let Some(v) = file {
            self.sources.insert(key, SettingSource::File);
            return Some(v);
        }
        self.sources.insert(key, SettingSource::Default);
        None
    }

    fn pick_without_env<T>(&mut self, key: &'static str, cli: Option<T>, file: Option<T>) -> Option<T> {
        let source = match (&cli, &file) {
            (Some(_), _) => SettingSource::Cli,
            (None, Some(_)) => SettingSource::File,
            (None, None) => SettingSource::Default,
        };
        self.sources.insert(key, source);
        cli.or(file)
    }
}

impl Settings {
    /// Load settings from `path` (or the default config path) using the
    /// process environment.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self, SettingsError> {
        Self::load_with_env(path, overrides, &|var| std::env::var(var).ok())
    }

    /// Like [`Settings::load`] with an explicit environment lookup.
    pub fn load_with_env(
        path: Option<&Path>,
        overrides: &Overrides,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        let explicit = path.is_some();
        let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
        let (file, file_path) = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let file: FileConfig = toml::from_str(&contents).map_err(|source| SettingsError::Parse {
                    path: path.clone(),
                    source,
                })?;
                log::debug!("Loaded settings from {}", path.display());
                (file, Some(path))
            }
            // A missing default file just means defaults; a missing explicit one is an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => (FileConfig::default(), None),
            Err(source) => return Err(SettingsError::Read { path, source }),
        };

        let mut r = Resolver {
            env,
            sources: BTreeMap::new(),
        };
        let FileConfig {
            watch,
            webhook,
            session,
            render,
            retry,
            database,
            control,
        } = file;

        let watch_dir = r
            .pick(
                "watch.dir",
                overrides.watch_dir.clone(),
                ENV_WATCH_DIR,
                PathBuf::from,
                watch.dir,
            )
            .unwrap_or_else(default_watch_dir);
        let process_existing = overrides.process_existing || watch.process_existing.unwrap_or(false);
        let webhook_url = r.pick("webhook.url", None, ENV_WEBHOOK_URL, |v| v, webhook.url);
        let chat_id = r.pick("session.chat_id", None, ENV_SESSION_CHAT, |v| v, session.chat_id);
        let database_path = r
            .pick("database.path", None, ENV_DB_PATH, PathBuf::from, database.path)
            .unwrap_or_else(|| data_dir().join("matches.db"));
        let browser = r.pick("render.browser", None, ENV_BROWSER, PathBuf::from, render.browser);
        let api_key = r.pick("control.api_key", None, ENV_API_KEY, |v| v, control.api_key);
        let file_addr = control
            .addr
            .map(|a| {
                a.parse::<SocketAddr>()
                    .map_err(|e| SettingsError::Invalid(format!("control.addr '{}': {}", a, e)))
            })
            .transpose()?;
        let control_addr = r.pick_without_env("control.addr", overrides.control_addr, file_addr);
        let session_enabled = !overrides.no_session && session.enabled.unwrap_or(true);

        let settings = Settings {
            watch: WatchSettings {
                dir: watch_dir,
                extension: watch
                    .extension
                    .unwrap_or_else(|| "xml".to_string())
                    .trim_start_matches('.')
                    .to_string(),
                quiet_period: millis(watch.quiet_period_ms, 1500),
                poll_interval: millis(watch.poll_interval_ms, 100),
                max_stabilize: secs(watch.max_stabilize_secs, 60),
                inter_match_delay: millis(watch.inter_match_delay_ms, 3000),
                release_grace: millis(watch.release_grace_ms, 5000),
                release_grace_on_cleanup_failure: millis(watch.release_grace_on_cleanup_failure_ms, 10_000),
                redrive_delay: millis(watch.redrive_delay_ms, 5000),
                max_redrives: watch.max_redrives.unwrap_or(3),
                process_existing,
            },
            webhook: WebhookSettings {
                url: webhook_url,
                timeout: secs(webhook.timeout_secs, 30),
            },
            session: SessionSettings {
                enabled: session_enabled,
                bridge_url: session
                    .bridge_url
                    .unwrap_or_else(|| "http://127.0.0.1:3311".to_string()),
                bridge_command: session.bridge_command.filter(|argv| !argv.is_empty()),
                profile_dir: session
                    .profile_dir
                    .unwrap_or_else(|| data_dir().join("session-profile")),
                chat_id,
                handshake_timeout: secs(session.handshake_timeout_secs, 180),
                probe_interval: secs(session.probe_interval_secs, 300),
                restart_delay: secs(session.restart_delay_secs, 5),
                request_timeout: secs(session.request_timeout_secs, 30),
            },
            render: RenderSettings {
                browser,
                sandbox_root: render
                    .sandbox_root
                    .unwrap_or_else(|| std::env::temp_dir().join("carnage-relay-render")),
                timeout: secs(render.timeout_secs, 30),
                width: render.width.unwrap_or(1200),
                height: render.height.unwrap_or(1000),
                output_dir: render.output_dir,
            },
            retry: RetryPolicy {
                max_attempts: retry.max_attempts.unwrap_or(5),
                base_delay: millis(retry.base_delay_ms, 1000),
                max_delay: millis(retry.max_delay_ms, 30_000),
            },
            database_path,
            control: ControlSettings {
                addr: control_addr,
                api_key,
            },
            sources: r.sources,
            file: file_path,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.watch.extension.is_empty() {
            return Err(SettingsError::Invalid("watch.extension is empty".to_string()));
        }
        if self.session.enabled {
            let sandbox = &self.render.sandbox_root;
            let profile = &self.session.profile_dir;
            if sandbox.starts_with(profile) || profile.starts_with(sandbox) {
                return Err(SettingsError::Invalid(format!(
                    "render.sandbox_root ({}) and session.profile_dir ({}) must be separate directories",
                    sandbox.display(),
                    profile.display()
                )));
            }
        }
        if self.control.addr.is_some() && self.control.api_key.is_none() {
            log::warn!("Control server has no api_key; mutating routes will reject every request");
        }
        Ok(())
    }

    pub fn source(&self, key: &str) -> SettingSource {
        self.sources.get(key).copied().unwrap_or(SettingSource::Default)
    }
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;

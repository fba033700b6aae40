//! The relay service: settings, folder watching, dispatch, the per-match
//! pipeline and the control surface.
//!
//! A report file flows through [`watcher`] → [`dispatcher`] → [`pipeline`],
//! which parses it, renders it, hands it to the delivery fan-out and cleans
//! up. [`Relay`] assembles all of it from [`Settings`].

pub mod control;
pub mod dispatcher;
pub mod filters;
pub mod pipeline;
pub mod relay;
pub mod settings;
pub mod stabilize;
pub mod watcher;

pub use control::{ControlState, build_router};
pub use dispatcher::{DispatchEvent, Dispatcher, DispatcherConfig, DispatcherHandle};
pub use filters::is_report_candidate;
pub use pipeline::{MatchPipeline, MatchProcessor, MatchSummary, PipelineError, ProcessOutcome};
pub use relay::{Relay, RelayError};
pub use settings::{Overrides, SettingSource, Settings, SettingsError, config_path};
pub use stabilize::{StabilizeError, wait_until_stable};
pub use watcher::{WatchError, watch_folder};

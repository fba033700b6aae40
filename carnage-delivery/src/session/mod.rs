//! The persistent browser-session chat destination.

pub mod bridge;
pub mod driver;
pub mod keeper;
pub mod lockfiles;

pub use bridge::{BridgeConfig, BridgeDriver};
pub use driver::{ChatInfo, DriverState, DriverStatus, SessionDriver};
pub use keeper::{SessionConfig, SessionKeeper, SessionSnapshot, SessionState};
pub use lockfiles::cleanup_lock_files;

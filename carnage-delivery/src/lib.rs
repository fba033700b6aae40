//! Fan-out delivery of rendered matches.
//!
//! A [`DeliveryFanout`] sends one rendered match to every configured
//! [`Destination`] concurrently and writes it to the match store at the same
//! time. Two destinations ship with the crate: a chat webhook
//! ([`WebhookDestination`]) and a long-lived browser chat session managed by
//! a [`SessionKeeper`] ([`SessionDestination`]).

pub mod backoff;
pub mod destination;
pub mod error;
pub mod fanout;
pub mod session;
pub mod summary;
pub mod webhook;

pub use backoff::RetryPolicy;
pub use destination::{Destination, Readiness, SessionDestination, WebhookDestination};
pub use error::{DeliveryError, SessionError};
pub use fanout::{DeliveryFanout, DeliveryReport, DestinationOutcome, PersistOutcome};
pub use session::{
    BridgeConfig, BridgeDriver, ChatInfo, DriverState, DriverStatus, SessionConfig, SessionDriver,
    SessionKeeper, SessionSnapshot, SessionState,
};
pub use webhook::WebhookClient;

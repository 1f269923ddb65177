//! Background reactivation core for the ReptiTrack reminder app.
//!
//! Periodically wakes the app while it is not in the foreground, re-checks
//! for due reminders and re-arms itself, indefinitely. Two OS-owned
//! schedulers sit behind one contract:
//!
//! - **Alarm** platforms: exact alarms when the user grants them, inexact
//!   alarms otherwise. No completion signal.
//! - **Budgeted** platforms: background refresh with an earliest-begin time,
//!   a bounded execution budget and an explicit completion signal.
//!
//! # Architecture
//!
//! - [`scheduler`]: Wake Scheduler Adapter (`arm` / `cancel` / `is_supported`)
//! - [`permissions`]: Permission Gate over the exact-scheduling grant
//! - [`wake`]: Wake Handler state machine (re-arm first, then check)
//! - [`bridge`]: duplex method channels to the application layer
//! - [`actions`]: notification-tap payload decoding and routing
//! - [`service`]: composition root wiring the above together
//!
//! OS primitives are consumed through the traits in [`platform`]; in-memory
//! simulators live in [`platform::sim`].

pub mod actions;
pub mod bridge;
pub mod config;
pub mod error;
pub mod logging;
pub mod permissions;
pub mod platform;
pub mod scheduler;
pub mod service;
pub mod wake;
pub mod wake_dirs;

pub use config::WakeConfig;
pub use error::{Result, WakeError};
pub use service::WakeService;

//! # snoozed core library
//!
//! Core logic for snoozed, a daemon that reminds the user of recurring
//! events (bedtime, lunch break, focus break) and enforces a system action
//! (suspend/shutdown/hibernate) unless interactively deferred a bounded
//! number of times.
//!
//! ## Architecture
//!
//! - **Schedule compiler**: pure mapping from the configuration to absolute
//!   (day-type, time-of-day) trigger specifications
//! - **Trigger installer**: idempotent replace-all of the managed crontab
//!   entries that fire the `warn`/`execute` entry points
//! - **Storage**: SQLite-backed snooze counters and deferred job queue,
//!   TOML-based configuration
//! - **Engine**: the per-alarm snooze state machine, talking to the desktop
//!   through capability traits
//! - **Daemon**: the one long-lived process; watches the config and fires
//!   deferred jobs as they come due
//!
//! ## Key Components
//!
//! - [`AlarmEngine`]: snooze state machine
//! - [`Database`]: counters and deferred job persistence
//! - [`Config`]: configuration management
//! - [`Daemon`]: config watch + job scan loops
//! - [`TriggerInstaller`]: external scheduler contract

pub mod alarm;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod installer;
pub mod storage;
pub mod triggers;

pub use alarm::{Action, Alarm, DayType, TimeOfDay, Warning};
pub use daemon::Daemon;
pub use engine::{AlarmEngine, Outcome};
pub use error::{ConfigError, CoreError, GatewayError, InstallError, StoreError};
pub use gateway::{ActionExecutor, Decision, DialogGateway, NotificationGateway, SystemActionExecutor};
pub use installer::{CronInstaller, TriggerInstaller};
pub use storage::{Config, Database};
pub use triggers::{compile, warning_time, TriggerKind, TriggerSpec};

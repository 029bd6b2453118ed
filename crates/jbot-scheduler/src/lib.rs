//! Periodic maintenance and alerting: CVE feed refresh and the per-channel
//! interval+counter alert mechanism that drives it (spec §4.10).
//!
//! # Overview
//!
//! [`engine::SchedulerEngine`] ticks once every `PERIODICS_SECS` (see
//! `jbot_core::config`) and, on each tick, refreshes ambient state (the NVD
//! CVE feed) and walks every known channel running each registered
//! [`engine::AlertRunner`] against it. Alerts fire on their first
//! opportunity and then once every `<alert>-interval` ticks thereafter,
//! tracked via a `<alert>-counter` channel setting.

pub mod cve;
pub mod engine;
pub mod error;
pub mod types;

pub use engine::{AlertRegistry, AlertRunner, CveAlertRunner, CveCache, SchedulerEngine};
pub use error::{Result, SchedulerError};
pub use types::CveItem;

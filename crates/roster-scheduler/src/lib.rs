//! `roster-scheduler`: Tokio-based periodic job engine.
//!
//! # Overview
//!
//! Jobs are registered on a [`engine::SchedulerEngine`] before it runs. The
//! engine sleeps until the earliest due job, publishes a [`FiredJob`] for it
//! on an mpsc channel, and plans the job's next run on a fixed grid: first
//! after a delay, then every N seconds. It stops when the shutdown `watch`
//! channel flips to `true`.

pub mod engine;
pub mod error;
pub mod schedule;
pub mod types;

pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use types::{FiredJob, Job, Schedule};

use chrono::{DateTime, Utc};

/// First run `first_delay_secs` after registration, then every `every_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub first_delay_secs: u64,
    pub every_secs: u64,
}

/// A registered job.
#[derive(Debug, Clone)]
pub struct Job {
    /// Assigned by the engine, starting at 1.
    pub id: u64,
    /// Routing key for fired jobs.
    pub name: String,
    pub schedule: Schedule,
}

/// Published on the engine's channel every time a job fires.
#[derive(Debug, Clone)]
pub struct FiredJob {
    pub job_id: u64,
    pub name: String,
    /// 1-based run number.
    pub run: u32,
    pub fired_at: DateTime<Utc>,
}

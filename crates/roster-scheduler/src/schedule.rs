use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Result, SchedulerError};
use crate::types::Schedule;

/// Reject schedules that would spin (a zero repeat interval).
pub fn validate(schedule: &Schedule) -> Result<()> {
    if schedule.every_secs == 0 {
        return Err(SchedulerError::InvalidSchedule(
            "interval must be at least one second".into(),
        ));
    }
    Ok(())
}

/// First run of a job registered at `registered`.
pub fn first_run(schedule: &Schedule, registered: Instant) -> Instant {
    registered + Duration::from_secs(schedule.first_delay_secs)
}

/// Run following the one planned for `previous`. Runs stay on the original
/// grid: a late fire does not shift later ones.
pub fn next_run(schedule: &Schedule, previous: Instant) -> Instant {
    previous + Duration::from_secs(schedule.every_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_after_delay_then_every_period() {
        let schedule = Schedule {
            first_delay_secs: 10,
            every_secs: 43_200,
        };
        let start = Instant::now();
        let first = first_run(&schedule, start);
        assert_eq!(first - start, Duration::from_secs(10));
        assert_eq!(next_run(&schedule, first) - first, Duration::from_secs(43_200));
    }

    #[test]
    fn zero_delay_fires_immediately() {
        let schedule = Schedule {
            first_delay_secs: 0,
            every_secs: 60,
        };
        let start = Instant::now();
        assert_eq!(first_run(&schedule, start), start);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let schedule = Schedule {
            first_delay_secs: 5,
            every_secs: 0,
        };
        assert!(matches!(
            validate(&schedule),
            Err(SchedulerError::InvalidSchedule(_))
        ));
    }
}

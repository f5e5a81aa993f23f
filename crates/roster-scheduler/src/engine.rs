use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    schedule::{first_run, next_run, validate},
    types::{FiredJob, Job, Schedule},
};

struct Entry {
    job: Job,
    run_count: u32,
    /// Planned time of the next run.
    next: Instant,
}

/// Core scheduler: holds registered jobs and fires them on time.
pub struct SchedulerEngine {
    jobs: Vec<Entry>,
    next_id: u64,
    /// If set, fired jobs are sent here for routing.
    fired_tx: Option<mpsc::Sender<FiredJob>>,
}

impl SchedulerEngine {
    /// Pass `Some(tx)` to receive a [`FiredJob`] for every run. The sender is
    /// non-blocking (`try_send`) so the loop is never stalled by a slow consumer.
    pub fn new(fired_tx: Option<mpsc::Sender<FiredJob>>) -> Self {
        Self {
            jobs: Vec::new(),
            next_id: 1,
            fired_tx,
        }
    }

    /// Register a job; its first run is planned relative to now.
    pub fn add_job(&mut self, name: &str, schedule: Schedule) -> Result<Job> {
        validate(&schedule)?;

        let job = Job {
            id: self.next_id,
            name: name.to_string(),
            schedule,
        };
        self.next_id += 1;
        self.jobs.push(Entry {
            job: job.clone(),
            run_count: 0,
            next: first_run(&schedule, Instant::now()),
        });
        info!(job_id = job.id, %name, ?schedule, "job added");
        Ok(job)
    }

    /// Main loop. Runs until `shutdown` broadcasts `true` or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(jobs = self.jobs.len(), "scheduler engine started");
        if *shutdown.borrow() {
            info!("scheduler engine shutting down");
            return;
        }

        loop {
            let wake = self.next_wake();
            tokio::select! {
                _ = sleep_until(wake) => self.tick(Instant::now()),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn next_wake(&self) -> Option<Instant> {
        self.jobs.iter().map(|entry| entry.next).min()
    }

    /// Fire every job whose planned run has arrived.
    fn tick(&mut self, now: Instant) {
        for entry in &mut self.jobs {
            if entry.next > now {
                continue;
            }

            entry.run_count += 1;
            entry.next = following(&entry.job.schedule, entry.next, now);
            let job = &entry.job;

            info!(job_id = job.id, name = %job.name, run = entry.run_count, "executing job");

            if let Some(ref tx) = self.fired_tx {
                let fired = FiredJob {
                    job_id: job.id,
                    name: job.name.clone(),
                    run: entry.run_count,
                    fired_at: Utc::now(),
                };
                // try_send never blocks the loop; the run is dropped when the channel is full.
                if tx.try_send(fired).is_err() {
                    warn!(job_id = job.id, "delivery channel full or closed, job dropped");
                }
            }
        }
    }
}

/// Next planned run after `planned`, skipping runs already in the past.
fn following(schedule: &Schedule, planned: Instant, now: Instant) -> Instant {
    let mut next = next_run(schedule, planned);
    while next <= now {
        debug!("skipping missed run");
        next = next_run(schedule, next);
    }
    next
}

async fn sleep_until(wake: Option<Instant>) {
    match wake {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::SchedulerError;

    fn report_schedule() -> Schedule {
        Schedule {
            first_delay_secs: 10,
            every_secs: 43_200,
        }
    }

    fn assert_secs(elapsed: Duration, secs: u64) {
        assert_eq!(elapsed.as_secs(), secs, "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_initial_delay_then_on_interval() {
        let (tx, mut rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut engine = SchedulerEngine::new(Some(tx));
        let job = engine.add_job("expiry-report", report_schedule()).unwrap();
        assert_eq!(job.id, 1);

        let start = Instant::now();
        let handle = tokio::spawn(engine.run(shutdown_rx));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.name, "expiry-report");
        assert_eq!(first.job_id, 1);
        assert_eq!(first.run, 1);
        assert_secs(start.elapsed(), 10);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.run, 2);
        assert_secs(start.elapsed(), 43_210);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn full_channel_drops_runs_without_stalling() {
        let (tx, mut rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut engine = SchedulerEngine::new(Some(tx));
        let schedule = Schedule {
            first_delay_secs: 1,
            every_secs: 1,
        };
        engine.add_job("report", schedule).unwrap();
        let handle = tokio::spawn(engine.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(rx.recv().await.unwrap().run, 1);
        assert!(rx.try_recv().is_err());

        // The loop kept running: later runs arrive with their own numbers.
        assert!(rx.recv().await.unwrap().run >= 4);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn stops_when_shutdown_sender_is_dropped() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut engine = SchedulerEngine::new(None);
        engine.add_job("report", report_schedule()).unwrap();
        drop(shutdown_tx);
        tokio::time::timeout(Duration::from_secs(1), engine.run(shutdown_rx))
            .await
            .unwrap();
    }

    #[test]
    fn zero_interval_job_is_rejected() {
        let mut engine = SchedulerEngine::new(None);
        let spin = Schedule {
            first_delay_secs: 0,
            every_secs: 0,
        };
        assert!(matches!(
            engine.add_job("spin", spin),
            Err(SchedulerError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn missed_runs_collapse_into_one() {
        let schedule = Schedule {
            first_delay_secs: 0,
            every_secs: 10,
        };
        let start = Instant::now();
        let late = start + Duration::from_secs(35);
        assert_eq!(
            following(&schedule, start, late),
            start + Duration::from_secs(40)
        );
    }
}

//! Replays a recorded job history from a CSV trace.
//!
//! Grounded in `vmmad/batchsys/replay.py`'s `JobsFromFile`: jobs are loaded
//! once at construction time, ordered by submission time, and admitted into
//! the live set as the clock passes each one's `SUBMITTED_AT`. Jobs are
//! dropped once `SUBMITTED_AT + RUN_DURATION` has elapsed.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use orchestrator_core::clock::Clock;
use orchestrator_core::job::Job;
use orchestrator_core::ports::{BatchSystem, ProviderError};

use crate::error::BatchSysError;

struct FutureJob {
    job_id: String,
    submitted_at: f64,
    duration: f64,
}

/// `BatchSystem` adapter that replays a CSV trace (`JOBID`, `SUBMITTED_AT`,
/// `RUN_DURATION` columns, header required) against a `Clock`.
pub struct ReplayBatchSystem<C> {
    clock: Arc<C>,
    future_jobs: VecDeque<FutureJob>,
    live_jobs: HashMap<String, Job>,
    start_time: f64,
}

/// A trace loaded from disk but not yet wired to a `Clock`. Split out so
/// callers that need to know the trace's start time (the Simulator, to
/// seed its `VirtualClock`) can do so before a clock exists to hand in.
pub struct LoadedTrace {
    future_jobs: VecDeque<FutureJob>,
    start_time: f64,
}

impl LoadedTrace {
    /// Loads `path`, keeping only jobs submitted after `start_time`. Pass
    /// `None` to load every job in the file and use its earliest submission
    /// time as the effective start.
    pub fn from_csv_path(path: &str, start_time: Option<f64>) -> Result<Self, BatchSysError> {
        let mut reader = csv::Reader::from_path(path)?;
        let floor = start_time.unwrap_or(-1.0);
        let mut jobs = Vec::new();
        for record in reader.deserialize::<RawRow>() {
            let row = record?;
            if row.submitted_at > floor {
                jobs.push(FutureJob {
                    job_id: row.jobid,
                    submitted_at: row.submitted_at,
                    duration: row.run_duration,
                });
            }
        }
        jobs.sort_by(|a, b| a.submitted_at.partial_cmp(&b.submitted_at).unwrap());
        let start_time = match start_time {
            Some(ts) => ts,
            None => jobs.first().map(|j| j.submitted_at).unwrap_or(0.0),
        };
        tracing::info!(path, loaded = jobs.len(), "loaded replay job trace");
        Ok(Self {
            future_jobs: jobs.into(),
            start_time,
        })
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn into_batch_system<C: Clock>(self, clock: Arc<C>) -> ReplayBatchSystem<C> {
        ReplayBatchSystem {
            clock,
            future_jobs: self.future_jobs,
            live_jobs: HashMap::new(),
            start_time: self.start_time,
        }
    }
}

impl<C: Clock> ReplayBatchSystem<C> {
    /// Loads `path` and wires it to `clock` in one step, for callers that
    /// don't need the start time before the clock exists.
    pub fn from_csv_path(
        path: &str,
        clock: Arc<C>,
        start_time: Option<f64>,
    ) -> Result<Self, BatchSysError> {
        Ok(LoadedTrace::from_csv_path(path, start_time)?.into_batch_system(clock))
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Marks a pending job RUNNING on `exec_node`. Called by the Simulator
    /// driver, which is the only component that knows which VM a job landed
    /// on; the trace itself carries no placement information.
    pub fn assign_to_node(&mut self, job_id: &str, exec_node: &str, running_at: f64) {
        if let Some(job) = self.live_jobs.get_mut(job_id) {
            job.start_running(running_at, exec_node);
        }
    }

    /// IDs of currently tracked jobs still awaiting a VM assignment.
    pub fn pending_job_ids(&self) -> Vec<String> {
        self.live_jobs
            .values()
            .filter(|job| job.state() == orchestrator_core::job::JobState::Pending)
            .map(|job| job.job_id().to_string())
            .collect()
    }

    /// True once every job in the trace has been admitted, assigned, and
    /// completed — the Simulator's sole termination condition (mirrors the
    /// original's `JobsFromFile`-specific check: no running, no live, no
    /// future jobs left).
    pub fn is_exhausted(&self) -> bool {
        self.future_jobs.is_empty() && self.live_jobs.is_empty()
    }
}

impl<C: Clock + Send + Sync> BatchSystem for ReplayBatchSystem<C> {
    async fn snapshot(&mut self) -> Result<Vec<Job>, ProviderError> {
        let now = self.clock.now();

        while let Some(next) = self.future_jobs.front() {
            if next.submitted_at > now {
                break;
            }
            let next = self.future_jobs.pop_front().unwrap();
            self.live_jobs
                .insert(next.job_id.clone(), Job::pending(next.job_id, next.submitted_at).with_duration(next.duration));
        }

        self.live_jobs
            .retain(|_, job| job.submitted_at().unwrap_or(now) + job.duration().unwrap_or(0.0) >= now);

        Ok(self.live_jobs.values().cloned().collect())
    }
}

#[derive(Debug, serde::Deserialize)]
struct RawRow {
    #[serde(rename = "JOBID")]
    jobid: String,
    #[serde(rename = "SUBMITTED_AT")]
    submitted_at: f64,
    #[serde(rename = "RUN_DURATION")]
    run_duration: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::clock::VirtualClock;
    use std::io::Write;

    fn write_trace(name: &str, rows: &[(&str, f64, f64)]) -> String {
        let path = format!("/tmp/batchsys-replay-test-{}-{}.csv", std::process::id(), name);
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "JOBID,SUBMITTED_AT,RUN_DURATION").unwrap();
        for (id, submitted, duration) in rows {
            writeln!(f, "{id},{submitted},{duration}").unwrap();
        }
        path
    }

    #[tokio::test]
    async fn admits_jobs_as_clock_passes_submission_time() {
        let path = write_trace("admits", &[("j1", 0.0, 100.0), ("j2", 50.0, 100.0)]);
        let clock = Arc::new(VirtualClock::new(0.0, 25.0));
        let mut batchsys = ReplayBatchSystem::from_csv_path(&path, clock.clone(), None).unwrap();

        let snapshot = batchsys.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].job_id(), "j1");

        clock.advance_cycle();
        clock.advance_cycle();
        let snapshot = batchsys.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn drops_jobs_past_submitted_plus_duration() {
        let path = write_trace("drops", &[("j1", 0.0, 10.0)]);
        let clock = Arc::new(VirtualClock::new(0.0, 20.0));
        let mut batchsys = ReplayBatchSystem::from_csv_path(&path, clock.clone(), None).unwrap();

        let snapshot = batchsys.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);

        clock.advance_cycle();
        let snapshot = batchsys.snapshot().await.unwrap();
        assert!(snapshot.is_empty());

        std::fs::remove_file(&path).ok();
    }
}

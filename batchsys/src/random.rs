//! Synthesizes job arrivals instead of replaying a trace.
//!
//! Grounded in `vmmad/batchsys/randomjobs.py`'s `RandomJobs`: each call
//! performs `attempts` independent Bernoulli(`probability`) trials and may
//! admit a new PENDING job with a duration drawn uniformly from
//! `duration_range`.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;

use orchestrator_core::clock::Clock;
use orchestrator_core::job::Job;
use orchestrator_core::ports::{BatchSystem, ProviderError};

pub struct RandomBatchSystem<C> {
    clock: Arc<C>,
    attempts: u32,
    probability: f64,
    duration_range: (f64, f64),
    next_job_id: u64,
    live_jobs: HashMap<String, Job>,
}

impl<C: Clock> RandomBatchSystem<C> {
    pub fn new(clock: Arc<C>, attempts: u32, probability: f64, duration_range: (f64, f64)) -> Self {
        assert!((0.0..=1.0).contains(&probability));
        assert!(duration_range.0 <= duration_range.1);
        Self {
            clock,
            attempts,
            probability,
            duration_range,
            next_job_id: 0,
            live_jobs: HashMap::new(),
        }
    }

    pub fn assign_to_node(&mut self, job_id: &str, exec_node: &str, running_at: f64) {
        if let Some(job) = self.live_jobs.get_mut(job_id) {
            job.start_running(running_at, exec_node);
        }
    }
}

impl<C: Clock + Send + Sync> BatchSystem for RandomBatchSystem<C> {
    async fn snapshot(&mut self) -> Result<Vec<Job>, ProviderError> {
        let now = self.clock.now();
        let mut rng = rand::rng();

        for _ in 0..self.attempts {
            if rng.random::<f64>() > self.probability {
                continue;
            }
            let job_id = self.next_job_id.to_string();
            self.next_job_id += 1;
            let duration = rng.random_range(self.duration_range.0..=self.duration_range.1);
            self.live_jobs
                .insert(job_id.clone(), Job::pending(job_id, now).with_duration(duration));
        }

        self.live_jobs
            .retain(|_, job| job.submitted_at().unwrap_or(now) + job.duration().unwrap_or(0.0) >= now);

        Ok(self.live_jobs.values().cloned().collect())
    }
}

use serde::{Deserialize, Serialize};

/// State of a batch job as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    Pending,
    Running,
    Finished,
    Other,
}

/// A batch-system job, as returned by a `BatchSystem::snapshot()`.
///
/// Invariant: `state == Running` implies `exec_node_name` is set; `state ==
/// Pending` implies it is unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    job_id: String,
    state: JobState,
    name: Option<String>,
    submitted_at: Option<f64>,
    running_at: Option<f64>,
    exec_node_name: Option<String>,
    duration: Option<f64>,
}

impl Job {
    pub fn new(job_id: impl Into<String>, state: JobState) -> Self {
        Self {
            job_id: job_id.into(),
            state,
            name: None,
            submitted_at: None,
            running_at: None,
            exec_node_name: None,
            duration: None,
        }
    }

    pub fn pending(job_id: impl Into<String>, submitted_at: f64) -> Self {
        let mut job = Self::new(job_id, JobState::Pending);
        job.submitted_at = Some(submitted_at);
        job
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_submitted_at(mut self, ts: f64) -> Self {
        self.submitted_at = Some(ts);
        self
    }

    /// Transition this job to RUNNING on the given exec node. Enforces the
    /// `Running => exec_node_name set` invariant at the type level.
    pub fn start_running(&mut self, running_at: f64, exec_node_name: impl Into<String>) {
        self.state = JobState::Running;
        self.running_at = Some(running_at);
        self.exec_node_name = Some(exec_node_name.into());
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn submitted_at(&self) -> Option<f64> {
        self.submitted_at
    }

    pub fn running_at(&self) -> Option<f64> {
        self.running_at
    }

    pub fn exec_node_name(&self) -> Option<&str> {
        self.exec_node_name.as_deref()
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Validates the `Running => exec_node_name set` invariant. Returns
    /// `false` on violation rather than panicking; callers decide whether
    /// that is a dev-build abort or a production-build skip (see
    /// `crate::error`).
    pub fn invariant_holds(&self) -> bool {
        match self.state {
            JobState::Running => self.exec_node_name.is_some(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_job_without_exec_node_violates_invariant() {
        let job = Job::new("j1", JobState::Running);
        assert!(!job.invariant_holds());
    }

    #[test]
    fn start_running_sets_exec_node_and_satisfies_invariant() {
        let mut job = Job::pending("j1", 0.0);
        job.start_running(10.0, "vm-1");
        assert!(job.invariant_holds());
        assert_eq!(job.exec_node_name(), Some("vm-1"));
        assert_eq!(job.state(), JobState::Running);
    }
}

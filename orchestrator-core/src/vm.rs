use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// State of a managed VM. Forms the DAG `Starting -> Ready -> (Draining ->)?
/// Stopping -> Down`; `Starting -> Down` is allowed on start failure or
/// start-timeout; any state may move to `Other` on unexpected provider
/// status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VmState {
    Starting,
    Ready,
    Draining,
    Stopping,
    Down,
    Other,
}

impl VmState {
    pub fn is_alive(self) -> bool {
        !matches!(self, VmState::Down)
    }

    pub fn is_active(self) -> bool {
        matches!(self, VmState::Ready | VmState::Draining)
    }
}

/// A managed VM. `auth` is the opaque bearer token handed to the instance at
/// boot and consumed exactly once by the first valid `ready` callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vm {
    vm_id: String,
    auth: String,
    state: VmState,
    nodename: Option<String>,
    jobs: BTreeSet<String>,
    started_at: Option<f64>,
    ready_at: Option<f64>,
    stopped_at: Option<f64>,
    running_time: f64,
    total_idle: f64,
    last_idle: f64,
    bill: f64,
}

impl Vm {
    pub fn new_starting(vm_id: impl Into<String>, auth: impl Into<String>) -> Self {
        Self {
            vm_id: vm_id.into(),
            auth: auth.into(),
            state: VmState::Starting,
            nodename: None,
            jobs: BTreeSet::new(),
            started_at: None,
            ready_at: None,
            stopped_at: None,
            running_time: 0.0,
            total_idle: 0.0,
            last_idle: 0.0,
            bill: 0.0,
        }
    }

    pub fn vm_id(&self) -> &str {
        &self.vm_id
    }

    pub fn auth(&self) -> &str {
        &self.auth
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn set_state(&mut self, state: VmState) {
        self.state = state;
    }

    pub fn nodename(&self) -> Option<&str> {
        self.nodename.as_deref()
    }

    pub fn jobs(&self) -> &BTreeSet<String> {
        &self.jobs
    }

    pub fn jobs_mut(&mut self) -> &mut BTreeSet<String> {
        &mut self.jobs
    }

    pub fn started_at(&self) -> Option<f64> {
        self.started_at
    }

    pub fn set_started_at(&mut self, ts: f64) {
        self.started_at = Some(ts);
    }

    pub fn ready_at(&self) -> Option<f64> {
        self.ready_at
    }

    pub fn stopped_at(&self) -> Option<f64> {
        self.stopped_at
    }

    pub fn set_stopped_at(&mut self, ts: f64) {
        self.stopped_at = Some(ts);
    }

    pub fn running_time(&self) -> f64 {
        self.running_time
    }

    pub fn add_running_time(&mut self, delta: f64) {
        self.running_time += delta;
    }

    pub fn total_idle(&self) -> f64 {
        self.total_idle
    }

    pub fn last_idle(&self) -> f64 {
        self.last_idle
    }

    pub fn set_last_idle(&mut self, value: f64) {
        self.last_idle = value;
    }

    /// Idle bookkeeping for one cycle: if the VM currently has no assigned
    /// jobs, both counters grow by `elapsed`; otherwise `last_idle` resets.
    pub fn accumulate_idle(&mut self, elapsed: f64) {
        if self.jobs.is_empty() {
            self.total_idle += elapsed;
            self.last_idle += elapsed;
        } else {
            self.last_idle = 0.0;
        }
    }

    pub fn bill(&self) -> f64 {
        self.bill
    }

    pub fn add_bill(&mut self, amount: f64) {
        self.bill += amount;
    }

    /// Promotes this VM from STARTING to READY. Strips a trailing DNS
    /// suffix from `hostname` (everything after the first `.`), matching
    /// the original `nodename.split('.')[0]` behavior.
    pub fn promote_to_ready(&mut self, ready_at: f64, hostname: &str) {
        let nodename = hostname.split('.').next().unwrap_or(hostname).to_string();
        self.state = VmState::Ready;
        self.ready_at = Some(ready_at);
        self.nodename = Some(nodename);
    }

    /// `nodename` must be set iff the VM has reached READY at least once.
    pub fn invariant_holds(&self) -> bool {
        match self.state {
            VmState::Starting => self.nodename.is_none(),
            _ => true,
        }
    }
}

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::RngCore;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::handle_invariant_violation;
use crate::job::{Job, JobState};
use crate::ports::{BatchSystem, NodeProvider, Policy, ProviderError};
use crate::pool::WorkerPool;
use crate::vm::{Vm, VmState};

/// A `ready(auth, hostname)` request delivered to the reconciliation loop
/// from another task (typically the web surface). Mirrors the
/// request/oneshot-reply shape of `worker::dto::Message` / `CommandSender`,
/// which is how this workspace routes cross-task mutation requests into a
/// single owning task.
struct ReadyRequest {
    auth: String,
    hostname: String,
    reply: oneshot::Sender<bool>,
}

/// Handle cloned into the web surface to submit `ready` callbacks to the
/// reconciliation loop without sharing mutable state directly.
#[derive(Clone)]
pub struct ReadySender(mpsc::Sender<ReadyRequest>);

impl ReadySender {
    pub async fn request(&self, auth: String, hostname: String) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .0
            .send(ReadyRequest {
                auth,
                hostname,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }
}

/// Outcome of a dispatched `start_vm`/`stop_vm` call, fed back to the
/// reconciliation loop over a channel so state mutation stays confined to
/// the single owning task (spec §5 option iii) even though the call itself
/// ran on the bounded worker pool.
enum VmEvent {
    StartSucceeded { vm_id: String },
    StartFailed { vm_id: String, error: ProviderError },
    StopSucceeded { vm_id: String },
    StopFailed { vm_id: String, error: ProviderError },
}

/// A read-only snapshot of orchestrator state, cheap enough to hand to the
/// web surface for the status page without exposing the live maps.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub cycle: u64,
    pub vms: Vec<Vm>,
}

/// Everything the spec's "Orchestrator state" (§3) names, minus the ports
/// and tunables which live alongside it on `Orchestrator`.
struct OrchestratorState {
    vms: HashMap<String, Vm>,
    pending_auth: HashMap<String, String>,
    vms_by_nodename: HashMap<String, String>,
    jobs: HashMap<String, Job>,
    candidates: HashSet<String>,
    cycle: u64,
    last_update: f64,
    next_vm_id: u64,
    /// Clock time at which the previous cycle started, so the next cycle
    /// can account against the actual elapsed time instead of the nominal
    /// `delay` (spec §4.1 step 1, §8 idle-counter property).
    last_cycle_time: f64,
}

impl OrchestratorState {
    fn new(initial_cycle_time: f64) -> Self {
        Self {
            vms: HashMap::new(),
            pending_auth: HashMap::new(),
            vms_by_nodename: HashMap::new(),
            jobs: HashMap::new(),
            candidates: HashSet::new(),
            cycle: 0,
            last_update: 0.0,
            next_vm_id: 0,
            last_cycle_time: initial_cycle_time,
        }
    }
}

/// Owns the VM table, job table, candidate set, and book-keeping counters,
/// and runs the reconciliation loop (spec §4.1). Generic over the three
/// ports plus a clock, so the same loop drives both a live deployment and
/// the Simulator.
pub struct Orchestrator<N, B, P, C> {
    state: OrchestratorState,
    config: Config,
    provider: Arc<N>,
    batchsys: B,
    policy: P,
    clock: Arc<C>,
    pool: WorkerPool,
    ready_rx: mpsc::Receiver<ReadyRequest>,
    ready_tx: mpsc::Sender<ReadyRequest>,
    event_rx: mpsc::UnboundedReceiver<VmEvent>,
    event_tx: mpsc::UnboundedSender<VmEvent>,
    status_tx: watch::Sender<StatusSnapshot>,
}

impl<N, B, P, C> Orchestrator<N, B, P, C>
where
    N: NodeProvider + 'static,
    B: BatchSystem,
    P: Policy,
    C: Clock + 'static,
{
    pub fn new(config: Config, provider: N, batchsys: B, policy: P, clock: Arc<C>) -> Self {
        let (ready_tx, ready_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(StatusSnapshot { cycle: 0, vms: Vec::new() });
        // The first cycle has no real "previous cycle start" to measure
        // against; backdating by `delay` makes its accounted elapsed time
        // equal to the nominal cycle length, same as every cycle after it
        // runs on schedule.
        let initial_cycle_time = clock.now() - config.delay;
        Self {
            state: OrchestratorState::new(initial_cycle_time),
            config,
            provider: Arc::new(provider),
            batchsys,
            policy,
            clock,
            pool: WorkerPool::default(),
            ready_rx,
            ready_tx,
            event_rx,
            event_tx,
            status_tx,
        }
    }

    pub fn ready_sender(&self) -> ReadySender {
        ReadySender(self.ready_tx.clone())
    }

    /// A live view of orchestrator status, for the web surface's status
    /// page. Updated once per completed cycle.
    pub fn status_receiver(&self) -> watch::Receiver<StatusSnapshot> {
        self.status_tx.subscribe()
    }

    pub fn status_snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            cycle: self.state.cycle,
            vms: self.state.vms.values().cloned().collect(),
        }
    }

    fn publish_status(&self) {
        let _ = self.status_tx.send(self.status_snapshot());
    }

    /// Registers a VM that was never started through the provider, already
    /// READY under `nodename_prefix-<vmId>`. Used by the Simulator for its
    /// "ever-running" pre-existing cluster nodes, which by definition were
    /// never dispatched a `startVm` call. Consumes the same `vm_id`
    /// allocator as `new_vm`, so calling this before any elastic VM is
    /// created reproduces "the first N VMs" numbering the Simulator relies
    /// on to recognize its permanent nodes.
    pub fn bootstrap_ready_vm(&mut self, nodename_prefix: &str, now: f64) -> String {
        let vm_id = self.state.next_vm_id.to_string();
        self.state.next_vm_id += 1;
        let mut vm = Vm::new_starting(vm_id.clone(), String::new());
        vm.promote_to_ready(now, &format!("{nodename_prefix}-{vm_id}"));
        let nodename = vm.nodename().expect("just promoted").to_string();
        self.state.vms_by_nodename.insert(nodename, vm_id.clone());
        self.state.vms.insert(vm_id.clone(), vm);
        vm_id
    }

    /// Constructs a STARTING VM with a fresh, monotonic `vm_id` and a fresh
    /// auth token not currently present in `pending_auth`.
    pub fn new_vm(&mut self) -> Vm {
        let vm_id = self.state.next_vm_id.to_string();
        self.state.next_vm_id += 1;
        let auth = loop {
            let candidate = random_auth_token();
            if !self.state.pending_auth.contains_key(&candidate) {
                break candidate;
            }
        };
        Vm::new_starting(vm_id, auth)
    }

    /// Promotes a STARTING VM to READY. Returns `false` and logs if `auth`
    /// is unknown; otherwise sets `state = Ready`, records `ready_at`,
    /// stores `nodename`, registers `nodename -> vm_id`, and clears `auth`
    /// from `pending_auth`. Re-registration of an already-mapped nodename
    /// overwrites with a warning.
    pub fn vm_is_ready(&mut self, auth: &str, hostname: &str) -> bool {
        let Some(vm_id) = self.state.pending_auth.remove(auth) else {
            error!(auth, "ready callback with unknown auth token");
            return false;
        };
        let now = self.clock.now();
        let Some(vm) = self.state.vms.get_mut(&vm_id) else {
            error!(vm_id, "pending_auth pointed at a VM no longer tracked");
            return false;
        };
        vm.promote_to_ready(now, hostname);
        let nodename = vm.nodename().expect("just set by promote_to_ready").to_string();
        if let Some(previous) = self.state.vms_by_nodename.get(&nodename) {
            if previous != &vm_id {
                warn!(
                    nodename = nodename.as_str(),
                    previous_vm = previous.as_str(),
                    new_vm = vm_id.as_str(),
                    "nodename re-registered to a different VM"
                );
            }
        }
        self.state.vms_by_nodename.insert(nodename, vm_id);
        true
    }

    /// Runs the reconciliation loop. Sleeps so that one cycle starts every
    /// `delay` wall-clock seconds; if a cycle overruns, warns and begins
    /// the next one immediately. `max_cycles == 0` means run forever.
    pub async fn run(&mut self, delay: f64, max_cycles: u64) {
        loop {
            if max_cycles != 0 && self.state.cycle >= max_cycles {
                return;
            }
            let cycle_started = Instant::now();
            self.step().await;

            let elapsed = cycle_started.elapsed();
            let budget = Duration::from_secs_f64(delay.max(0.0));
            if elapsed >= budget {
                if delay > 0.0 {
                    warn!(
                        cycle = self.state.cycle,
                        elapsed_secs = elapsed.as_secs_f64(),
                        budget_secs = delay,
                        "cycle overran its budget; starting next cycle immediately"
                    );
                }
                continue;
            }
            let deadline = Instant::now() + (budget - elapsed);
            self.drain_until(deadline).await;
        }
    }

    /// Runs exactly one reconciliation cycle and returns, with no sleep and
    /// no wait for stragglers. `run` calls this in a loop; the Simulator
    /// calls it directly so it can interleave its own between-cycle logic
    /// (readiness simulation, job placement, CSV output) the way `run`'s
    /// caller cannot reach into.
    pub async fn step(&mut self) {
        self.run_cycle().await;
        self.state.cycle += 1;
        self.drain_events_nonblocking();
        self.maybe_checkpoint();
        self.publish_status();
    }

    fn drain_events_nonblocking(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.apply_event(event);
        }
    }

    /// Yields once so any `start_vm`/`stop_vm` dispatched by the `step()`
    /// that just ran gets a chance to be polled on the worker pool, then
    /// drains whatever outcomes arrived. The Simulator calls this right
    /// after `step()` so a dispatched start's effects (`started_at`,
    /// `pending_auth`) are visible before it decides whether to simulate a
    /// `ready` callback this same iteration; a live deployment never needs
    /// this; it lets `drain_until`'s own sleep do the waiting.
    pub async fn settle(&mut self) {
        tokio::task::yield_now().await;
        self.drain_events_nonblocking();
    }

    /// Direct access to the batch-system port, for callers (the Simulator)
    /// that know the concrete adapter type and need to drive it beyond the
    /// `BatchSystem` trait (e.g. assigning a job to a node).
    pub fn batchsys_mut(&mut self) -> &mut B {
        &mut self.batchsys
    }

    pub fn cycle(&self) -> u64 {
        self.state.cycle
    }

    pub fn running_job_count(&self) -> usize {
        self.state.jobs.values().filter(|j| j.state() == JobState::Running).count()
    }

    pub fn pending_job_count(&self) -> usize {
        self.state.jobs.values().filter(|j| j.state() == JobState::Pending).count()
    }

    /// Overwrites a VM's idle counter directly. The Simulator uses this to
    /// seed a negative boot-delay countdown on freshly-started VMs, reusing
    /// the same field `garbage_collect_and_account` increments every cycle
    /// while the VM has no jobs (mirrors the original's dual use of
    /// `vm.last_idle` for both boot countdown and idle-shutdown tracking).
    pub fn set_vm_last_idle(&mut self, vm_id: &str, value: f64) {
        if let Some(vm) = self.state.vms.get_mut(vm_id) {
            vm.set_last_idle(value);
        }
    }

    /// Services incoming `ready` requests and async start/stop outcomes
    /// until `deadline`. This is how both `vmIsReady` calls and worker-pool
    /// results get applied without the reconciliation loop ever sharing its
    /// state behind a lock (spec §5 option iii); results "become visible"
    /// the next time this drains, per spec §5's ordering guarantee.
    async fn drain_until(&mut self, deadline: Instant) {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(remaining) => return,
                maybe_req = self.ready_rx.recv() => {
                    match maybe_req {
                        Some(req) => {
                            let ok = self.vm_is_ready(&req.auth, &req.hostname);
                            let _ = req.reply.send(ok);
                        }
                        None => return,
                    }
                }
                maybe_event = self.event_rx.recv() => {
                    match maybe_event {
                        Some(event) => self.apply_event(event),
                        None => return,
                    }
                }
            }
        }
    }

    fn apply_event(&mut self, event: VmEvent) {
        let now = self.clock.now();
        match event {
            VmEvent::StartSucceeded { vm_id } => {
                if let Some(vm) = self.state.vms.get_mut(&vm_id) {
                    vm.set_started_at(now);
                    let auth = vm.auth().to_string();
                    self.state.pending_auth.insert(auth, vm_id);
                }
            }
            VmEvent::StartFailed { vm_id, error } => {
                error!(vm_id, error = %error, "start_vm failed");
                if let Some(vm) = self.state.vms.get_mut(&vm_id) {
                    vm.set_state(VmState::Down);
                }
                self.state.pending_auth.retain(|_, v| v != &vm_id);
            }
            VmEvent::StopSucceeded { vm_id } => {
                if let Some(vm) = self.state.vms.get_mut(&vm_id) {
                    vm.set_stopped_at(now);
                    vm.set_state(VmState::Down);
                    info!(
                        vm_id,
                        running_time = vm.running_time(),
                        total_idle = vm.total_idle(),
                        "VM stopped"
                    );
                }
            }
            VmEvent::StopFailed { vm_id, error } => {
                error!(vm_id, error = %error, "stop_vm failed, will retry next cycle");
            }
        }
    }

    /// The 8-step cycle of spec §4.1. Accounting (step 4) runs against the
    /// actual wall-clock time since the previous cycle started, not the
    /// nominal `delay`: under a cycle overrun the two diverge, and using the
    /// nominal value would under-count `runningTime`/`totalIdle`/`lastIdle`
    /// (spec §8's `lastIdle >= delta` property). For the Simulator, whose
    /// `VirtualClock` advances by exactly `time_interval` (== `delay`) per
    /// cycle, the measured and nominal values coincide.
    async fn run_cycle(&mut self) {
        let cycle_now = self.clock.now();
        let elapsed = cycle_now - self.state.last_cycle_time;
        self.state.last_cycle_time = cycle_now;
        self.before();

        self.update_jobs().await;

        if let Err(err) = self.refresh_vms().await {
            warn!(error = %err, "refresh failed, keeping prior VM state");
        }

        self.garbage_collect_and_account(elapsed);
        self.start_new_vms();
        self.stop_idle_vms();

        self.after();
    }

    /// Hook invoked at the start of every cycle. No-op in this workspace;
    /// present as an extension point for deployments that need to run work
    /// synchronized with the cycle boundary.
    pub fn before(&mut self) {}

    /// Hook invoked at the end of every cycle.
    pub fn after(&mut self) {}

    fn maybe_checkpoint(&self) {
        let Some(path) = self.config.checkpoint_path.as_deref() else {
            return;
        };
        if self.state.cycle % self.config.checkpoint_interval_cycles.max(1) != 0 {
            return;
        }
        let checkpoint = crate::checkpoint::Checkpoint {
            cycle: self.state.cycle,
            vms: self.state.vms.values().map(crate::checkpoint::VmSummary::from).collect(),
        };
        crate::checkpoint::save(path, &checkpoint);
    }

    /// spec §4.2 `updateJobs`.
    async fn update_jobs(&mut self) {
        let snapshot = match self.batchsys.snapshot().await {
            Ok(jobs) => jobs,
            Err(err) => {
                warn!(error = %err, "batch-system snapshot failed, job table unchanged");
                return;
            }
        };

        let now = self.clock.now();
        let current_ids: HashSet<String> =
            snapshot.iter().map(|j| j.job_id().to_string()).collect();
        let old_ids: HashSet<String> = self.state.jobs.keys().cloned().collect();

        for job in &snapshot {
            if !job.invariant_holds()
                && handle_invariant_violation(&format!(
                    "job {} RUNNING without exec_node_name",
                    job.job_id()
                ))
            {
                continue;
            }
            let is_new = !self.state.jobs.contains_key(job.job_id());
            if is_new {
                info!(job_id = job.job_id(), state = ?job.state(), "new job observed");
            } else if let Some(ts) = job.running_at().or(job.submitted_at()) {
                if ts < self.state.last_update {
                    debug!(
                        job_id = job.job_id(),
                        ts,
                        last_update = self.state.last_update,
                        "job timestamp precedes last_update"
                    );
                }
            }
            self.state.jobs.insert(job.job_id().to_string(), job.clone());
        }

        let terminated: HashSet<String> = old_ids.difference(&current_ids).cloned().collect();
        for job_id in &terminated {
            if let Some(job) = self.state.jobs.get(job_id) {
                if job.state() == JobState::Running {
                    info!(
                        job_id = job_id.as_str(),
                        exec_node = job.exec_node_name().unwrap_or("unknown"),
                        "job terminated"
                    );
                }
            }
            self.state.candidates.remove(job_id);
            self.state.jobs.remove(job_id);
        }

        for vm in self.state.vms.values_mut() {
            if vm.state().is_active() {
                for job_id in &terminated {
                    vm.jobs_mut().remove(job_id);
                }
            }
        }

        for job in &snapshot {
            match job.state() {
                JobState::Running => {
                    if let Some(running_at) = job.running_at() {
                        if running_at > self.state.last_update {
                            self.state.candidates.remove(job.job_id());
                            if let Some(exec_node) = job.exec_node_name() {
                                if let Some(vm_id) = self.state.vms_by_nodename.get(exec_node) {
                                    if let Some(vm) = self.state.vms.get_mut(vm_id) {
                                        vm.jobs_mut().insert(job.job_id().to_string());
                                    }
                                }
                            }
                        }
                    }
                }
                JobState::Pending => {
                    if let Some(submitted_at) = job.submitted_at() {
                        if submitted_at > self.state.last_update
                            && self.policy.is_cloud_candidate(job)
                        {
                            self.state.candidates.insert(job.job_id().to_string());
                        }
                    }
                }
                _ => {}
            }
        }

        self.state.last_update = now;
    }

    async fn refresh_vms(&mut self) -> Result<(), ProviderError> {
        let mut vms: Vec<Vm> = self.state.vms.values().cloned().collect();
        self.provider.refresh(&mut vms).await?;
        for vm in vms {
            self.state.vms.insert(vm.vm_id().to_string(), vm);
        }
        Ok(())
    }

    /// Step 4: garbage-collect DOWN VMs, dispatch start-timeout stops, and
    /// accumulate running-time / idle counters.
    fn garbage_collect_and_account(&mut self, elapsed: f64) {
        let now = self.clock.now();
        let vm_ids: Vec<String> = self.state.vms.keys().cloned().collect();

        for vm_id in vm_ids {
            let Some(vm) = self.state.vms.get(&vm_id) else {
                continue;
            };

            if vm.state() == VmState::Down {
                self.remove_vm(&vm_id);
                continue;
            }

            if vm.state() == VmState::Starting {
                if let Some(started_at) = vm.started_at() {
                    if now - started_at > self.config.vm_start_timeout {
                        warn!(vm_id, "start timeout exceeded, dispatching stop");
                        if let Some(vm) = self.state.vms.get_mut(&vm_id) {
                            vm.set_state(VmState::Stopping);
                        }
                        self.dispatch_stop(vm_id);
                        continue;
                    }
                }
            }

            let Some(vm) = self.state.vms.get_mut(&vm_id) else {
                continue;
            };
            if matches!(vm.state(), VmState::Ready | VmState::Stopping | VmState::Other) {
                vm.add_running_time(elapsed);
            }
            vm.accumulate_idle(elapsed);
        }
    }

    /// Step 5: start new VMs, up to `max_delta` times per cycle.
    fn start_new_vms(&mut self) {
        for _ in 0..self.config.max_delta {
            let running_accepting = self
                .state
                .vms
                .values()
                .filter(|vm| vm.state().is_active())
                .count();
            if !self
                .policy
                .is_new_vm_needed(self.state.candidates.len(), running_accepting)
            {
                break;
            }
            if self.state.vms.len() >= self.config.max_vms {
                break;
            }
            let vm = self.new_vm();
            let vm_id = vm.vm_id().to_string();
            self.state.vms.insert(vm_id.clone(), vm);
            self.dispatch_start(vm_id);
        }
    }

    /// Step 6: stop idle VMs. Iterates a snapshot of `vms`; moves each
    /// stoppable VM to STOPPING synchronously (so it cannot be re-selected
    /// this cycle) before dispatching the async stop.
    fn stop_idle_vms(&mut self) {
        let candidates: Vec<String> = self
            .state
            .vms
            .iter()
            .filter(|(_, vm)| vm.state() == VmState::Ready)
            .map(|(id, _)| id.clone())
            .collect();

        for vm_id in candidates {
            let Some(vm) = self.state.vms.get(&vm_id) else {
                continue;
            };
            if !self.policy.can_vm_be_stopped(vm) {
                continue;
            }
            if !vm.jobs().is_empty() {
                warn!(vm_id, "stopping VM with jobs still assigned");
            }
            if let Some(vm) = self.state.vms.get_mut(&vm_id) {
                vm.set_state(VmState::Stopping);
            }
            self.dispatch_stop(vm_id);
        }
    }

    fn dispatch_start(&mut self, vm_id: String) {
        let Some(vm) = self.state.vms.get(&vm_id).cloned() else {
            return;
        };
        let provider = self.provider.clone();
        let events = self.event_tx.clone();
        self.pool.dispatch(async move {
            let event = match provider.start_vm(&vm).await {
                Ok(()) => VmEvent::StartSucceeded { vm_id: vm.vm_id().to_string() },
                Err(error) => VmEvent::StartFailed { vm_id: vm.vm_id().to_string(), error },
            };
            let _ = events.send(event);
        });
    }

    fn dispatch_stop(&mut self, vm_id: String) {
        let Some(vm) = self.state.vms.get(&vm_id).cloned() else {
            return;
        };
        let provider = self.provider.clone();
        let events = self.event_tx.clone();
        self.pool.dispatch(async move {
            let event = match provider.stop_vm(&vm).await {
                Ok(()) => VmEvent::StopSucceeded { vm_id: vm.vm_id().to_string() },
                Err(error) => VmEvent::StopFailed { vm_id: vm.vm_id().to_string(), error },
            };
            let _ = events.send(event);
        });
    }

    fn remove_vm(&mut self, vm_id: &str) {
        self.state.vms.remove(vm_id);
        self.state.pending_auth.retain(|_, v| v != vm_id);
        self.state.vms_by_nodename.retain(|_, v| v != vm_id);
    }
}

fn random_auth_token() -> String {
    let mut bytes = [0u8; 20];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RealClock;
    use std::sync::Mutex;

    struct AlwaysNeedsVm;
    impl Policy for AlwaysNeedsVm {
        fn is_cloud_candidate(&self, _job: &Job) -> bool {
            true
        }
        fn can_vm_be_stopped(&self, vm: &Vm) -> bool {
            vm.jobs().is_empty() && vm.last_idle() > 30.0
        }
    }

    struct NoopProvider {
        calls: Mutex<Vec<&'static str>>,
    }
    impl NoopProvider {
        fn new() -> Self {
            Self { calls: Mutex::new(Vec::new()) }
        }
    }
    impl NodeProvider for NoopProvider {
        async fn start_vm(&self, _vm: &Vm) -> Result<(), ProviderError> {
            self.calls.lock().unwrap().push("start");
            Ok(())
        }
        async fn stop_vm(&self, _vm: &Vm) -> Result<(), ProviderError> {
            self.calls.lock().unwrap().push("stop");
            Ok(())
        }
        async fn refresh(&self, _vms: &mut [Vm]) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    struct EmptyBatchSystem;
    impl BatchSystem for EmptyBatchSystem {
        async fn snapshot(&mut self) -> Result<Vec<Job>, ProviderError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn new_vm_tokens_are_unique_and_not_yet_pending() {
        let config = Config::default();
        let mut orchestrator = Orchestrator::new(
            config,
            NoopProvider::new(),
            EmptyBatchSystem,
            AlwaysNeedsVm,
            Arc::new(RealClock),
        );
        let vm1 = orchestrator.new_vm();
        let vm2 = orchestrator.new_vm();
        assert_ne!(vm1.auth(), vm2.auth());
        assert_ne!(vm1.vm_id(), vm2.vm_id());
    }

    #[tokio::test]
    async fn vm_is_ready_rejects_unknown_auth() {
        let config = Config::default();
        let mut orchestrator = Orchestrator::new(
            config,
            NoopProvider::new(),
            EmptyBatchSystem,
            AlwaysNeedsVm,
            Arc::new(RealClock),
        );
        assert!(!orchestrator.vm_is_ready("nonexistent", "vm-1"));
    }

    #[tokio::test]
    async fn vm_is_ready_promotes_starting_to_ready() {
        let config = Config::default();
        let mut orchestrator = Orchestrator::new(
            config,
            NoopProvider::new(),
            EmptyBatchSystem,
            AlwaysNeedsVm,
            Arc::new(RealClock),
        );
        let vm = orchestrator.new_vm();
        let vm_id = vm.vm_id().to_string();
        let auth = vm.auth().to_string();
        orchestrator.state.vms.insert(vm_id.clone(), vm);
        orchestrator.state.pending_auth.insert(auth.clone(), vm_id.clone());

        assert!(orchestrator.vm_is_ready(&auth, "vm-7.cluster.local"));
        let vm = orchestrator.state.vms.get(&vm_id).unwrap();
        assert_eq!(vm.state(), VmState::Ready);
        assert_eq!(vm.nodename(), Some("vm-7"));
        assert!(!orchestrator.state.pending_auth.contains_key(&auth));
    }
}

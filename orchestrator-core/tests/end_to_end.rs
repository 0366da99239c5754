//! End-to-end scenarios exercising the full reconciliation cycle through
//! `Orchestrator::step`/`settle`, driven by a `VirtualClock` so every
//! timestamp in these tests is exact and reproducible.

use std::sync::{Arc, Mutex};

use orchestrator_core::clock::VirtualClock;
use orchestrator_core::config::Config;
use orchestrator_core::job::Job;
use orchestrator_core::ports::{BatchSystem, NodeProvider, Policy, ProviderError};
use orchestrator_core::reconciler::Orchestrator;
use orchestrator_core::vm::{Vm, VmState};

/// A `NodeProvider` that accepts every start/stop instantly, the way
/// `nodeprovider::DummyProvider` does for its in-memory `live` set.
struct AcceptingProvider;

impl NodeProvider for AcceptingProvider {
    async fn start_vm(&self, _vm: &Vm) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn stop_vm(&self, _vm: &Vm) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn refresh(&self, _vms: &mut [Vm]) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// A `BatchSystem` whose snapshot the test can rewrite between cycles, to
/// script job arrivals and terminations one cycle at a time.
#[derive(Clone, Default)]
struct ScriptedJobs(Arc<Mutex<Vec<Job>>>);

impl ScriptedJobs {
    fn set(&self, jobs: Vec<Job>) {
        *self.0.lock().unwrap() = jobs;
    }
}

impl BatchSystem for ScriptedJobs {
    async fn snapshot(&mut self) -> Result<Vec<Job>, ProviderError> {
        Ok(self.0.lock().unwrap().clone())
    }
}

/// Every pending job is a candidate; a VM can be stopped once idle past
/// `idle_threshold`.
struct ThresholdPolicy {
    idle_threshold: f64,
}

impl Policy for ThresholdPolicy {
    fn is_cloud_candidate(&self, _job: &Job) -> bool {
        true
    }

    fn can_vm_be_stopped(&self, vm: &Vm) -> bool {
        vm.jobs().is_empty() && vm.last_idle() > self.idle_threshold
    }
}

#[tokio::test]
async fn trivial_start_promotes_a_pending_job_into_a_ready_vm() {
    let config = Config { max_vms: 1, ..Config::default() };
    let clock = Arc::new(VirtualClock::new(0.0, 1.0));
    let jobs = ScriptedJobs::default();
    jobs.set(vec![Job::pending("j1", 0.5)]);
    let policy = ThresholdPolicy { idle_threshold: f64::INFINITY };

    let mut orchestrator =
        Orchestrator::new(config, AcceptingProvider, jobs, policy, clock.clone());

    orchestrator.step().await;
    orchestrator.settle().await;

    let snapshot = orchestrator.status_snapshot();
    assert_eq!(snapshot.vms.len(), 1);
    let vm = &snapshot.vms[0];
    assert_eq!(vm.state(), VmState::Starting);
    let auth = vm.auth().to_string();

    assert!(orchestrator.vm_is_ready(&auth, "vm-0"));

    let snapshot = orchestrator.status_snapshot();
    let vm = &snapshot.vms[0];
    assert_eq!(vm.state(), VmState::Ready);
    assert_eq!(vm.nodename(), Some("vm-0"));
}

#[tokio::test]
async fn idle_vm_is_stopped_and_removed_after_crossing_the_threshold() {
    let config = Config { max_vms: 1, delay: 20.0, ..Config::default() };
    let clock = Arc::new(VirtualClock::new(0.0, 20.0));
    let jobs = ScriptedJobs::default();
    jobs.set(vec![Job::pending("j1", 0.5)]);
    let policy = ThresholdPolicy { idle_threshold: 30.0 };

    let mut orchestrator =
        Orchestrator::new(config, AcceptingProvider, jobs, policy, clock.clone());

    orchestrator.step().await;
    orchestrator.settle().await;
    let auth = orchestrator.status_snapshot().vms[0].auth().to_string();
    assert!(orchestrator.vm_is_ready(&auth, "vm-0"));

    // Cycle 1: clock advances 20s, below the 30s threshold, stays READY.
    clock.advance_cycle();
    orchestrator.step().await;
    orchestrator.settle().await;
    let snapshot = orchestrator.status_snapshot();
    assert_eq!(snapshot.vms.len(), 1);
    assert_eq!(snapshot.vms[0].state(), VmState::Ready);

    // Cycle 2: clock advances another 20s (40s idle total), over the
    // threshold, dispatches a stop.
    clock.advance_cycle();
    orchestrator.step().await;
    orchestrator.settle().await;
    let snapshot = orchestrator.status_snapshot();
    assert_eq!(snapshot.vms[0].state(), VmState::Down);

    // Cycle 3: garbage collection removes the DOWN vm.
    clock.advance_cycle();
    orchestrator.step().await;
    orchestrator.settle().await;
    assert!(orchestrator.status_snapshot().vms.is_empty());
}

#[tokio::test]
async fn vm_stuck_starting_past_the_timeout_is_stopped_and_removed() {
    let config = Config { max_vms: 1, vm_start_timeout: 60.0, ..Config::default() };
    let clock = Arc::new(VirtualClock::new(0.0, 61.0));
    let jobs = ScriptedJobs::default();
    jobs.set(vec![Job::pending("j1", 0.5)]);
    let policy = ThresholdPolicy { idle_threshold: f64::INFINITY };

    let mut orchestrator =
        Orchestrator::new(config, AcceptingProvider, jobs, policy, clock.clone());

    // Cycle 0 at t=0: dispatches the start, never a `ready` callback.
    orchestrator.step().await;
    orchestrator.settle().await;
    assert_eq!(orchestrator.status_snapshot().vms[0].state(), VmState::Starting);

    // Cycle 1 at t=61: 61s since started_at=0 exceeds the 60s timeout.
    clock.advance_cycle();
    orchestrator.step().await;
    orchestrator.settle().await;
    assert_eq!(orchestrator.status_snapshot().vms[0].state(), VmState::Down);

    // Cycle 2: garbage collection removes it.
    orchestrator.step().await;
    orchestrator.settle().await;
    assert!(orchestrator.status_snapshot().vms.is_empty());
}

#[tokio::test]
async fn terminated_job_is_dropped_from_the_table_and_its_vm() {
    let config = Config { max_vms: 1, ..Config::default() };
    let clock = Arc::new(VirtualClock::new(0.0, 1.0));
    let jobs = ScriptedJobs::default();
    let policy = ThresholdPolicy { idle_threshold: f64::INFINITY };

    let mut orchestrator =
        Orchestrator::new(config, AcceptingProvider, jobs.clone(), policy, clock.clone());

    // Consume vm_id "0" so the bootstrapped node lands on "1", matching the
    // job's exec_node_name below.
    let _ = orchestrator.new_vm();
    orchestrator.bootstrap_ready_vm("vm", 0.0);

    let mut j1 = Job::pending("j1", 10.0);
    j1.start_running(10.0, "vm-1");
    let j2 = Job::pending("j2", 10.0);
    jobs.set(vec![j1, j2]);

    orchestrator.step().await;
    orchestrator.settle().await;

    assert_eq!(orchestrator.running_job_count(), 1);
    assert_eq!(orchestrator.pending_job_count(), 1);
    let snapshot = orchestrator.status_snapshot();
    let vm = snapshot.vms.iter().find(|v| v.nodename() == Some("vm-1")).unwrap();
    assert_eq!(vm.jobs().len(), 1);
    assert!(vm.jobs().contains("j1"));

    // j1 vanishes from the next snapshot: it has terminated.
    let j2_again = Job::pending("j2", 10.0);
    jobs.set(vec![j2_again]);

    orchestrator.step().await;
    orchestrator.settle().await;

    assert_eq!(orchestrator.running_job_count(), 0);
    assert_eq!(orchestrator.pending_job_count(), 1);
    let snapshot = orchestrator.status_snapshot();
    let vm = snapshot.vms.iter().find(|v| v.nodename() == Some("vm-1")).unwrap();
    assert!(vm.jobs().is_empty());
}

#[tokio::test]
async fn ready_callback_with_unknown_auth_is_rejected_without_mutation() {
    let config = Config::default();
    let clock = Arc::new(VirtualClock::new(0.0, 1.0));
    let jobs = ScriptedJobs::default();
    let policy = ThresholdPolicy { idle_threshold: f64::INFINITY };

    let mut orchestrator =
        Orchestrator::new(config, AcceptingProvider, jobs, policy, clock);

    assert!(!orchestrator.vm_is_ready("totally-unknown-token", "vm-99"));
    assert!(orchestrator.status_snapshot().vms.is_empty());
}

//! Grounded in `vmmad/simul.py::OrchestratorSimulation`'s policy methods.

use orchestrator_core::job::Job;
use orchestrator_core::ports::Policy;
use orchestrator_core::vm::Vm;

/// Every job is a cloud candidate; a VM may be stopped once it has been idle
/// past `max_idle` seconds of simulated time, except the `cluster_size`
/// ever-running nodes, which are never stopped regardless of idle time.
pub struct SimPolicy {
    pub cluster_size: u64,
    pub max_idle: f64,
}

impl Policy for SimPolicy {
    fn is_cloud_candidate(&self, _job: &Job) -> bool {
        true
    }

    fn can_vm_be_stopped(&self, vm: &Vm) -> bool {
        if vm.vm_id().parse::<u64>().is_ok_and(|id| id < self.cluster_size) {
            return false;
        }
        vm.jobs().is_empty() && vm.last_idle() > self.max_idle
    }
}

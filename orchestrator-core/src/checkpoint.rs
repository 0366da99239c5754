use serde::{Deserialize, Serialize};

use crate::vm::{Vm, VmState};

/// A restart-time summary of one VM, enough to rebuild bookkeeping without
/// re-deriving it from scratch. Not a substitute for `Vm` itself: on load,
/// the reconciliation loop still calls `NodeProvider::refresh` to learn the
/// authoritative current state before trusting anything here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmSummary {
    pub vm_id: String,
    pub state: VmState,
    pub nodename: Option<String>,
    pub running_time: f64,
    pub total_idle: f64,
    pub bill: f64,
}

impl From<&Vm> for VmSummary {
    fn from(vm: &Vm) -> Self {
        Self {
            vm_id: vm.vm_id().to_string(),
            state: vm.state(),
            nodename: vm.nodename().map(str::to_string),
            running_time: vm.running_time(),
            total_idle: vm.total_idle(),
            bill: vm.bill(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub cycle: u64,
    pub vms: Vec<VmSummary>,
}

/// Writes `checkpoint` to `path` as JSON. Failures are logged, never
/// propagated: a missed checkpoint write must not interrupt the
/// reconciliation loop.
pub fn save(path: &str, checkpoint: &Checkpoint) {
    match serde_json::to_vec_pretty(checkpoint) {
        Ok(bytes) => {
            if let Err(err) = std::fs::write(path, bytes) {
                tracing::warn!(path, error = %err, "failed to write checkpoint file");
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to serialize checkpoint");
        }
    }
}

/// Best-effort load at startup. A missing or malformed file is not fatal;
/// it just means the orchestrator starts with an empty checkpoint history.
pub fn load(path: &str) -> Option<Checkpoint> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::info!(path, error = %err, "no checkpoint loaded");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(checkpoint) => Some(checkpoint),
        Err(err) => {
            tracing::warn!(path, error = %err, "checkpoint file present but unparsable, ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vm_summary_carries_core_fields() {
        let vm = Vm::new_starting("7", "authtoken");
        let summary = VmSummary::from(&vm);
        assert_eq!(summary.vm_id, "7");
        assert_eq!(summary.state, VmState::Starting);
        assert_eq!(summary.nodename, None);
    }
}

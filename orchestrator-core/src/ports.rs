use crate::job::Job;
use crate::vm::Vm;

/// Error returned by a `NodeProvider` operation. The core never inspects the
/// contents beyond logging them; adapters choose how descriptive to be.
#[derive(Debug, Clone)]
pub struct ProviderError(pub String);

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ProviderError {}

impl From<String> for ProviderError {
    fn from(s: String) -> Self {
        ProviderError(s)
    }
}

impl From<&str> for ProviderError {
    fn from(s: &str) -> Self {
        ProviderError(s.to_string())
    }
}

/// Starts, stops, and refreshes the state of VMs on a cloud. Implementations
/// must be safe to call concurrently for distinct VMs (`start_vm`/`stop_vm`
/// are dispatched onto the bounded worker pool, never awaited inline by the
/// reconciliation loop).
pub trait NodeProvider: Send + Sync {
    /// Reserve and launch a VM. Must populate any provider handle needed by
    /// later `stop_vm`/`refresh` calls for this VM. Returning `Ok(())` means
    /// "accepted by the cloud", not "running".
    async fn start_vm(&self, vm: &Vm) -> Result<(), ProviderError>;

    /// Tear down a VM. Must be idempotent: a second call against an
    /// already-stopped instance is a safe no-op, not an error.
    async fn stop_vm(&self, vm: &Vm) -> Result<(), ProviderError>;

    /// Refresh provider-observed state for the given VMs in place. Mapped to
    /// the core state enum by the adapter (pending/rebooting -> Starting,
    /// running -> Ready, terminated -> Down, unknown -> Other). A refresh
    /// reporting Ready is not authoritative for service readiness; only the
    /// `ready` callback is (see reconciler tie-break rules).
    async fn refresh(&self, vms: &mut [Vm]) -> Result<(), ProviderError>;
}

/// Returns a snapshot of the current full queue contents (pending and
/// running). The core relies on set-difference semantics between successive
/// snapshots to infer terminations, so the snapshot must be a consistent
/// point-in-time view.
pub trait BatchSystem: Send {
    async fn snapshot(&mut self) -> Result<Vec<Job>, ProviderError>;
}

/// The three deployment-supplied decision predicates. The core ships a
/// default `is_new_vm_needed` (true whenever there is at least one
/// candidate); there is no default for the other two.
pub trait Policy {
    fn is_cloud_candidate(&self, job: &Job) -> bool;

    fn is_new_vm_needed(&self, candidate_count: usize, _running_vms_accepting: usize) -> bool {
        candidate_count > 0
    }

    fn can_vm_be_stopped(&self, vm: &Vm) -> bool;
}

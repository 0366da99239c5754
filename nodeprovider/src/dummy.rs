//! A `NodeProvider` backed by no real cloud at all.
//!
//! Tracks which VMs it believes are live without touching any external API,
//! the way `DummyCloud` stands in for a real LibCloud driver. Used by the
//! Simulator and by integration tests; failures can be injected via
//! [`DummyProviderConfig`] the same way `MockBackendConfig` does for the VMM
//! mocks.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use orchestrator_core::ports::{NodeProvider, ProviderError};
use orchestrator_core::vm::{Vm, VmState};

/// Controls which operations should fail. All default to `None` (success).
#[derive(Debug, Clone, Default)]
pub struct DummyProviderConfig {
    pub start_error: Option<String>,
    pub stop_error: Option<String>,
}

/// Shared call counters, for tests to assert on.
#[derive(Debug, Clone, Default)]
pub struct DummyCallTracker {
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
    pub refreshes: Arc<AtomicUsize>,
}

impl DummyCallTracker {
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::Relaxed)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Relaxed)
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::Relaxed)
    }
}

/// No-op cloud provider that just remembers which `vm_id`s it has "started"
/// and never seen stopped. Mirrors `DummyCloud.start_vm`/`stop_vm`'s
/// bookkeeping without a real `libcloud` driver underneath.
pub struct DummyProvider {
    config: DummyProviderConfig,
    tracker: DummyCallTracker,
    live: Mutex<HashSet<String>>,
}

impl DummyProvider {
    pub fn new() -> (Self, DummyCallTracker) {
        Self::with_config(DummyProviderConfig::default())
    }

    pub fn with_config(config: DummyProviderConfig) -> (Self, DummyCallTracker) {
        let tracker = DummyCallTracker::default();
        let provider = Self {
            config,
            tracker: tracker.clone(),
            live: Mutex::new(HashSet::new()),
        };
        (provider, tracker)
    }
}

impl NodeProvider for DummyProvider {
    async fn start_vm(&self, vm: &Vm) -> Result<(), ProviderError> {
        self.tracker.starts.fetch_add(1, Ordering::Relaxed);
        if let Some(ref err) = self.config.start_error {
            return Err(ProviderError(err.clone()));
        }
        self.live.lock().unwrap().insert(vm.vm_id().to_string());
        Ok(())
    }

    async fn stop_vm(&self, vm: &Vm) -> Result<(), ProviderError> {
        self.tracker.stops.fetch_add(1, Ordering::Relaxed);
        if let Some(ref err) = self.config.stop_error {
            return Err(ProviderError(err.clone()));
        }
        // Idempotent: stopping an instance we never started, or already
        // stopped, is a no-op success.
        self.live.lock().unwrap().remove(vm.vm_id());
        Ok(())
    }

    async fn refresh(&self, vms: &mut [Vm]) -> Result<(), ProviderError> {
        self.tracker.refreshes.fetch_add(1, Ordering::Relaxed);
        let live = self.live.lock().unwrap();
        for vm in vms.iter_mut() {
            if vm.state() != VmState::Down && !live.contains(vm.vm_id()) {
                // We never heard a start_vm for this VM, or it was
                // stopped behind our back. Either way the cloud no longer
                // has it; let the reconciliation loop garbage-collect it.
                vm.set_state(VmState::Down);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_then_refresh_leaves_state_untouched() {
        let (provider, tracker) = DummyProvider::new();
        let vm = Vm::new_starting("1", "auth");
        provider.start_vm(&vm).await.unwrap();
        assert_eq!(tracker.start_count(), 1);

        let mut vms = vec![vm];
        provider.refresh(&mut vms).await.unwrap();
        assert_eq!(vms[0].state(), VmState::Starting);
    }

    #[tokio::test]
    async fn refresh_marks_untracked_vm_down() {
        let (provider, _tracker) = DummyProvider::new();
        let mut vms = vec![Vm::new_starting("9", "auth")];
        provider.refresh(&mut vms).await.unwrap();
        assert_eq!(vms[0].state(), VmState::Down);
    }

    #[tokio::test]
    async fn stop_is_idempotent_on_unknown_vm() {
        let (provider, tracker) = DummyProvider::new();
        let vm = Vm::new_starting("1", "auth");
        provider.stop_vm(&vm).await.unwrap();
        assert_eq!(tracker.stop_count(), 1);
    }

    #[tokio::test]
    async fn injected_start_error_is_returned() {
        let (provider, _) = DummyProvider::with_config(DummyProviderConfig {
            start_error: Some("quota exceeded".into()),
            stop_error: None,
        });
        let vm = Vm::new_starting("1", "auth");
        let err = provider.start_vm(&vm).await.unwrap_err();
        assert_eq!(err.to_string(), "quota exceeded");
    }
}

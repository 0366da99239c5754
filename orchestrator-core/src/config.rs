/// Tunables for the reconciliation loop (spec §3 "Orchestrator state ...
/// Tunables").
#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound on `|vms|` (STARTING VMs count against this, per the
    /// spec's resolution of the "overshoot" source bug).
    pub max_vms: usize,
    /// Cap on how many start dispatches may occur in a single cycle.
    pub max_delta: usize,
    /// How long a VM may remain STARTING before being force-stopped.
    pub vm_start_timeout: f64,
    /// Wall-clock seconds between the start of successive cycles.
    pub delay: f64,
    /// Optional path to a checkpoint file (see `crate::checkpoint`). `None`
    /// disables checkpointing.
    pub checkpoint_path: Option<String>,
    /// How many cycles between checkpoint writes, when enabled.
    pub checkpoint_interval_cycles: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_vms: 10,
            max_delta: 1,
            vm_start_timeout: 600.0,
            delay: 30.0,
            checkpoint_path: None,
            checkpoint_interval_cycles: 10,
        }
    }
}

impl Config {
    /// Reads overrides from environment variables, falling back to
    /// `Default::default()` for anything unset or unparsable. No
    /// command-line flag parsing is performed anywhere in this workspace
    /// (spec §1 explicitly places it out of scope).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("ORCHESTRATOR_MAX_VMS") {
            if let Ok(v) = v.parse() {
                config.max_vms = v;
            }
        }
        if let Ok(v) = std::env::var("ORCHESTRATOR_MAX_DELTA") {
            if let Ok(v) = v.parse() {
                config.max_delta = v;
            }
        }
        if let Ok(v) = std::env::var("ORCHESTRATOR_VM_START_TIMEOUT") {
            if let Ok(v) = v.parse() {
                config.vm_start_timeout = v;
            }
        }
        if let Ok(v) = std::env::var("ORCHESTRATOR_DELAY") {
            if let Ok(v) = v.parse() {
                config.delay = v;
            }
        }
        if let Ok(v) = std::env::var("ORCHESTRATOR_CHECKPOINT_PATH") {
            config.checkpoint_path = Some(v);
        }
        if let Ok(v) = std::env::var("ORCHESTRATOR_CHECKPOINT_INTERVAL_CYCLES") {
            if let Ok(v) = v.parse() {
                config.checkpoint_interval_cycles = v;
            }
        }
        config
    }
}

//! Tunables for the Simulator driver, mirroring `vmmad/simul.py`'s
//! `argparse` defaults. Read from the environment rather than flags, per
//! the workspace-wide "no hand-rolled CLI parser" convention.

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub max_vms: usize,
    pub max_delta: usize,
    pub max_idle: f64,
    pub startup_delay: f64,
    pub csv_file: String,
    pub output_file: String,
    pub cluster_size: u64,
    pub start_time: Option<f64>,
    pub time_interval: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_vms: 10,
            max_delta: 1,
            max_idle: 7200.0,
            startup_delay: 60.0,
            csv_file: "accounting.csv".to_string(),
            output_file: "main_sim.txt".to_string(),
            cluster_size: 20,
            start_time: None,
            time_interval: 3600.0,
        }
    }
}

impl SimulatorConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("SIMULATOR_MAX_VMS") {
            if let Ok(v) = v.parse() {
                config.max_vms = v;
            }
        }
        if let Ok(v) = std::env::var("SIMULATOR_MAX_DELTA") {
            if let Ok(v) = v.parse() {
                config.max_delta = v;
            }
        }
        if let Ok(v) = std::env::var("SIMULATOR_MAX_IDLE") {
            if let Ok(v) = v.parse() {
                config.max_idle = v;
            }
        }
        if let Ok(v) = std::env::var("SIMULATOR_STARTUP_DELAY") {
            if let Ok(v) = v.parse() {
                config.startup_delay = v;
            }
        }
        if let Ok(v) = std::env::var("SIMULATOR_CSV_FILE") {
            config.csv_file = v;
        }
        if let Ok(v) = std::env::var("SIMULATOR_OUTPUT_FILE") {
            config.output_file = v;
        }
        if let Ok(v) = std::env::var("SIMULATOR_CLUSTER_SIZE") {
            if let Ok(v) = v.parse() {
                config.cluster_size = v;
            }
        }
        if let Ok(v) = std::env::var("SIMULATOR_START_TIME") {
            if let Ok(v) = v.parse() {
                config.start_time = Some(v);
            }
        }
        if let Ok(v) = std::env::var("SIMULATOR_TIME_INTERVAL") {
            if let Ok(v) = v.parse() {
                config.time_interval = v;
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_argparse_defaults() {
        let config = SimulatorConfig::default();
        assert_eq!(config.max_vms, 10);
        assert_eq!(config.cluster_size, 20);
        assert_eq!(config.time_interval, 3600.0);
    }
}

//! Deterministic replay harness for the Orchestrator (spec.md §4.7).
//!
//! Drives the same `Orchestrator` used in production against a virtual
//! clock and a recorded job trace instead of a wall clock and a real batch
//! system, following `vmmad/simul.py::OrchestratorSimulation`. Rust has no
//! equivalent to that class's multiple inheritance from `Orchestrator` and
//! `DummyCloud` to override cycle behavior, so this binary drives
//! `Orchestrator::step()` directly in its own loop instead, using the
//! accessors `orchestrator-core` exposes for exactly this purpose.

mod config;
mod policy;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use batchsys::LoadedTrace;
use nodeprovider::DummyProvider;
use orchestrator_core::clock::VirtualClock;
use orchestrator_core::config::Config;
use orchestrator_core::reconciler::Orchestrator;
use orchestrator_core::vm::VmState;

use config::SimulatorConfig;
use policy::SimPolicy;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let sim_config = SimulatorConfig::from_env();
    info!(?sim_config, "starting simulation");

    let trace = LoadedTrace::from_csv_path(&sim_config.csv_file, sim_config.start_time)?;
    let starting_time = trace.start_time() - sim_config.time_interval;
    let clock = Arc::new(VirtualClock::new(starting_time, sim_config.time_interval));
    let batchsys = trace.into_batch_system(clock.clone());

    let (provider, _tracker) = DummyProvider::new();
    let policy = SimPolicy {
        cluster_size: sim_config.cluster_size,
        max_idle: sim_config.max_idle,
    };
    let orchestrator_config = Config {
        max_vms: sim_config.max_vms + sim_config.cluster_size as usize,
        max_delta: sim_config.max_delta,
        vm_start_timeout: f64::INFINITY,
        delay: sim_config.time_interval,
        checkpoint_path: None,
        checkpoint_interval_cycles: 1,
    };
    let mut orchestrator =
        Orchestrator::new(orchestrator_config, provider, batchsys, policy, clock.clone());

    let mut writer = csv::WriterBuilder::new().from_path(&sim_config.output_file)?;
    writer.write_record([
        "#TimeStamp",
        "Pending Jobs",
        "Running Jobs",
        "Started VMs",
        "Idle VMS",
    ])?;

    for i in 0..sim_config.cluster_size {
        orchestrator.bootstrap_ready_vm("clusternode", clock.now());
        info!(vm_id = i, "bootstrapped ever-running cluster node");
    }

    let mut boot_initialized: HashSet<String> = HashSet::new();

    loop {
        orchestrator.step().await;
        orchestrator.settle().await;

        let snapshot = orchestrator.status_snapshot();

        for vm in &snapshot.vms {
            if vm.state() != VmState::Starting {
                continue;
            }
            let Ok(id) = vm.vm_id().parse::<u64>() else {
                continue;
            };
            if id < sim_config.cluster_size {
                continue;
            }
            if boot_initialized.insert(vm.vm_id().to_string()) {
                orchestrator.set_vm_last_idle(vm.vm_id(), -sim_config.startup_delay);
                continue;
            }
            if vm.last_idle() >= 0.0 {
                let hostname = format!("vm-{}", vm.vm_id());
                orchestrator.vm_is_ready(vm.auth(), &hostname);
            }
        }

        if orchestrator.batchsys_mut().is_exhausted()
            && orchestrator.running_job_count() == 0
            && orchestrator.pending_job_count() == 0
        {
            info!("trace exhausted and no jobs remain, stopping simulation");
            break;
        }

        let snapshot = orchestrator.status_snapshot();
        let mut idle_ready: Vec<&orchestrator_core::vm::Vm> = snapshot
            .vms
            .iter()
            .filter(|vm| vm.state() == VmState::Ready && vm.jobs().is_empty())
            .collect();
        let pending_ids = orchestrator.batchsys_mut().pending_job_ids();
        let now = clock.now();
        for job_id in pending_ids {
            let Some(vm) = idle_ready.pop() else {
                break;
            };
            let Some(nodename) = vm.nodename() else {
                continue;
            };
            orchestrator
                .batchsys_mut()
                .assign_to_node(&job_id, nodename, now);
        }

        let idle_vm_count = snapshot
            .vms
            .iter()
            .filter(|vm| {
                vm.vm_id()
                    .parse::<u64>()
                    .is_ok_and(|id| id >= sim_config.cluster_size)
                    && vm.last_idle() > 0.0
                    && vm.jobs().is_empty()
            })
            .count();

        writer.write_record(&[
            now.to_string(),
            orchestrator.pending_job_count().to_string(),
            orchestrator.running_job_count().to_string(),
            snapshot.vms.len().to_string(),
            idle_vm_count.to_string(),
        ])?;
        writer.flush()?;

        clock.advance_cycle();
    }

    Ok(())
}

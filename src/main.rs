//! Production entry point: wires the reconciliation loop to a concrete
//! `NodeProvider`/`BatchSystem` pair and serves the web surface alongside
//! it, following `repohub::main`'s `#[tokio::main]` + `tracing_subscriber`
//! init shape.
//!
//! Concrete cloud back-ends and batch-system adapters are out of scope for
//! this spec (spec.md §1); the only adapters this workspace ships are the
//! `dummy` `NodeProvider` and the `random`/`replay` `BatchSystem`s, so that
//! is what this binary wires up. A real deployment swaps these two for its
//! own implementations of the `NodeProvider`/`BatchSystem` traits.

use std::sync::Arc;

use tracing::info;

use batchsys::RandomBatchSystem;
use nodeprovider::DummyProvider;
use orchestrator_core::clock::RealClock;
use orchestrator_core::config::Config;
use orchestrator_core::job::Job;
use orchestrator_core::ports::Policy;
use orchestrator_core::reconciler::Orchestrator;
use orchestrator_core::vm::Vm;
use orchestrator_web::AppState;

/// Stops a VM once it has sat idle for ten minutes with no jobs assigned.
/// Every pending job is a cloud candidate: there is no local/cloud job
/// split modeled in this workspace's sample wiring.
struct DefaultPolicy {
    idle_threshold_secs: f64,
}

impl Policy for DefaultPolicy {
    fn is_cloud_candidate(&self, _job: &Job) -> bool {
        true
    }

    fn can_vm_be_stopped(&self, vm: &Vm) -> bool {
        vm.jobs().is_empty() && vm.last_idle() > self.idle_threshold_secs
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let bind_address =
        std::env::var("ORCHESTRATOR_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    info!(max_vms = config.max_vms, delay = config.delay, "starting orchestrator");

    let clock = Arc::new(RealClock);
    let (provider, _tracker) = DummyProvider::new();
    let batchsys = RandomBatchSystem::new(clock.clone(), 5, 0.1, (60.0, 3600.0));
    let policy = DefaultPolicy {
        idle_threshold_secs: 600.0,
    };

    let delay = config.delay;
    let mut orchestrator = Orchestrator::new(config, provider, batchsys, policy, clock);

    let web_state = AppState::new(orchestrator.ready_sender(), orchestrator.status_receiver());
    let app = orchestrator_web::router(web_state);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(bind_address = bind_address.as_str(), "web surface listening");

    tokio::select! {
        _ = orchestrator.run(delay, 0) => {}
        result = axum::serve(listener, app) => {
            if let Err(err) = result {
                tracing::error!(error = %err, "web surface exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
        }
    }

    Ok(())
}

//! HTTP endpoints for the orchestrator (spec.md §4.6).
//!
//! Two routes, following `ci_service::web::index`'s plain
//! `Html`/`format!` rendering rather than `repohub`'s `askama` templates —
//! a single read-only status page does not warrant template-file
//! machinery.

use std::fmt::Write as _;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::info;

use orchestrator_core::reconciler::{ReadySender, StatusSnapshot};
use orchestrator_core::vm::VmState;

#[derive(Clone)]
pub struct AppState {
    ready: ReadySender,
    status: watch::Receiver<StatusSnapshot>,
}

impl AppState {
    pub fn new(ready: ReadySender, status: watch::Receiver<StatusSnapshot>) -> Self {
        Self { ready, status }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/x/ready", get(ready))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ReadyParams {
    auth: Option<String>,
    hostname: Option<String>,
}

/// `GET /x/ready?auth=...&hostname=...`
async fn ready(
    State(state): State<AppState>,
    Query(params): Query<ReadyParams>,
) -> (StatusCode, String) {
    let (Some(auth), Some(hostname)) = (params.auth, params.hostname) else {
        return (StatusCode::BAD_REQUEST, "missing auth or hostname".to_string());
    };
    if auth.is_empty() || hostname.is_empty() {
        return (StatusCode::BAD_REQUEST, "missing auth or hostname".to_string());
    }

    info!(hostname = hostname.as_str(), "ready callback received");
    if state.ready.request(auth, hostname).await {
        (StatusCode::OK, "OK".to_string())
    } else {
        (StatusCode::BAD_REQUEST, "unknown auth token".to_string())
    }
}

/// `GET /` — human-readable status page, structurally following
/// `vmmad/webapp.py::status`: cycle count, per-state VM counts, and a VM
/// table with a manual-ready link for anything still STARTING.
async fn index(State(state): State<AppState>) -> Html<String> {
    let snapshot = state.status.borrow().clone();

    let mut starting = 0;
    let mut ready_count = 0;
    let mut draining = 0;
    let mut stopping = 0;
    let mut down = 0;
    let mut other = 0;
    for vm in &snapshot.vms {
        match vm.state() {
            VmState::Starting => starting += 1,
            VmState::Ready => ready_count += 1,
            VmState::Draining => draining += 1,
            VmState::Stopping => stopping += 1,
            VmState::Down => down += 1,
            VmState::Other => other += 1,
        }
    }

    let mut body = String::new();
    let _ = write!(
        body,
        "<html><head><title>orchestrator status</title></head><body>\
         <h1>Orchestrator status</h1>\
         <p>Completed cycles: {}</p>\
         <p>STARTING: {starting} READY: {ready_count} DRAINING: {draining} \
         STOPPING: {stopping} DOWN: {down} OTHER: {other}</p>\
         <table border=\"1\"><tr><th>vmId</th><th>state</th><th>nodename</th><th>action</th></tr>",
        snapshot.cycle,
    );

    for vm in &snapshot.vms {
        let nodename = vm.nodename().unwrap_or("unknown");
        let action = if vm.state() == VmState::Starting {
            format!(
                "<a href=\"/x/ready?auth={}&amp;hostname=vm-{}.manual\">mark ready</a>",
                vm.auth(),
                vm.vm_id()
            )
        } else {
            String::new()
        };
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{:?}</td><td>{}</td><td>{}</td></tr>",
            vm.vm_id(),
            vm.state(),
            nodename,
            action
        );
    }

    body.push_str("</table></body></html>");
    Html(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::config::Config;
    use orchestrator_core::job::Job;
    use orchestrator_core::ports::{BatchSystem, NodeProvider, Policy, ProviderError};
    use orchestrator_core::reconciler::Orchestrator;
    use orchestrator_core::vm::Vm;
    use orchestrator_core::clock::RealClock;
    use std::sync::Arc;

    struct P;
    impl Policy for P {
        fn is_cloud_candidate(&self, _job: &Job) -> bool {
            false
        }
        fn can_vm_be_stopped(&self, _vm: &Vm) -> bool {
            false
        }
    }
    struct N;
    impl NodeProvider for N {
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
    struct Bs;
    impl BatchSystem for Bs {
        async fn snapshot(&mut self) -> Result<Vec<Job>, ProviderError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn ready_rejects_missing_params() {
        let orchestrator = Orchestrator::new(Config::default(), N, Bs, P, Arc::new(RealClock));
        let state = AppState::new(orchestrator.ready_sender(), orchestrator.status_receiver());
        let (status, _) = ready(
            State(state),
            Query(ReadyParams { auth: None, hostname: None }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use leadcron::Scheduler;

/// Routes reachable by job dispatch and by operators. Jobs target the
/// `/internal/*` paths through the in-process dispatcher; the same router
/// is served over the network for health checks and introspection.
pub fn internal_router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/internal/reports/daily", post(run_daily_report))
        .route("/internal/cache/sweep", post(sweep_cache))
}

/// Adds the job introspection route once the scheduler exists.
pub fn with_introspection(router: Router, scheduler: Arc<Scheduler>) -> Router {
    router.route(
        "/internal/jobs",
        get(list_jobs).with_state(scheduler),
    )
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn run_daily_report() -> Json<serde_json::Value> {
    tracing::info!("daily report generation triggered");
    Json(serde_json::json!({ "report": "started" }))
}

async fn sweep_cache() -> Json<serde_json::Value> {
    tracing::info!("cache sweep triggered");
    Json(serde_json::json!({ "sweep": "started" }))
}

#[derive(Serialize)]
struct JobStatus {
    name: String,
    running: Option<bool>,
}

async fn list_jobs(State(scheduler): State<Arc<Scheduler>>) -> Json<Vec<JobStatus>> {
    let jobs = scheduler
        .jobs()
        .iter()
        .map(|(name, trigger)| JobStatus {
            name: name.to_string(),
            running: trigger.running(),
        })
        .collect();
    Json(jobs)
}

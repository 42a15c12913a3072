//! System/health API handlers.
//!
//! # Purpose and responsibility
//! Provides a lightweight health endpoint for probes. It sits outside the
//! enforcement layer and needs no identity assertion.
//!
//! # Key invariants and assumptions
//! - Health checks are fast and side-effect free (no upstream I/O).
use crate::api::types::HealthStatus;
use crate::app::AppState;
use axum::Json;
use axum::extract::State;

/// Report liveness and the number of signing keys currently held.
pub(crate) async fn system_health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        keys: state.keys.len(),
    })
}

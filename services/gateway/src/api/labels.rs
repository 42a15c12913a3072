//! Enforced label inspection endpoint.
//!
//! Mounted behind the enforcement middleware; echoes the label values the
//! downstream query rewriter would receive for this request.
use crate::api::types::LabelsResponse;
use axum::{Extension, Json};
use lbac_authz::EnforcedLabelSet;

pub async fn enforced_labels(Extension(labels): Extension<EnforcedLabelSet>) -> Json<LabelsResponse> {
    Json(LabelsResponse {
        values: labels.into_values(),
    })
}

//! Enforcement middleware.
//!
//! # Purpose
//! Runs the [`Enforcer`](lbac_authz::Enforcer) for every request routed to
//! the downstream service. On success the [`EnforcedLabelSet`] is inserted
//! into the request extensions for the query rewriter; on failure the
//! request ends here with a JSON error and the downstream never runs.
//!
//! # Security considerations
//! - The assertion header value is passed as raw bytes and never logged.
use crate::api::error::ApiError;
use crate::app::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use lbac_authz::EnforcedLabelSet;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn enforce_labels(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Copy out before awaiting; the request body is not Sync.
    let assertion = request.headers().get(&state.identity_header).cloned();
    let labels: EnforcedLabelSet = match state
        .enforcer
        .enforce(assertion.as_ref().map(|value| value.as_bytes()))
        .await
    {
        Ok(labels) => labels,
        Err(err) => {
            let mut api_err = ApiError::from(err);
            api_err.body.request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            return api_err.into_response();
        }
    };

    request.extensions_mut().insert(labels);
    next.run(request).await
}

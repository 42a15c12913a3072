//! Gateway HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, the shared application state, and the background
//! tasks (key refresh, membership cache sweep) that live for the lifetime of
//! the process.
//!
//! # Notes
//! Route composition lives here to keep `main` small and testable. Every
//! route of the downstream router sits behind the enforcement middleware;
//! only the health endpoint is reachable without an identity assertion.
use crate::api;
use crate::config::GatewayConfig;
use crate::enforce::enforce_labels;
use crate::observability;
use anyhow::Context;
use axum::Router;
use axum::http::HeaderName;
use lbac_authz::{
    Enforcer, GroupApiClient, JwksKeySet, TokenValidator, TtlMembershipCache, spawn_sweeper,
};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub enforcer: Enforcer,
    pub identity_header: HeaderName,
    pub keys: Arc<JwksKeySet>,
}

pub fn build_router(state: AppState, downstream: Router) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            )
        });

    let enforced = downstream.layer(axum::middleware::from_fn_with_state(
        state.clone(),
        enforce_labels,
    ));

    Router::new()
        .route(
            "/v1/system/health",
            axum::routing::get(api::system::system_health),
        )
        .with_state(state)
        .merge(enforced)
        .layer(trace_layer)
}

/// Downstream mounted by the shipped binary: echoes the enforced label set.
pub fn labels_router() -> Router {
    Router::new().route(
        "/v1/labels",
        axum::routing::get(api::labels::enforced_labels),
    )
}

/// Wire the enforcer and start its background tasks.
///
/// # Errors
/// Fails if the identity header name is invalid, the HTTP client cannot be
/// built, the initial key discovery fails, or the group API URL is unusable.
pub async fn build_state(
    config: &GatewayConfig,
    cancel: CancellationToken,
) -> anyhow::Result<(AppState, Vec<JoinHandle<()>>)> {
    let identity_header = HeaderName::from_bytes(config.identity_header.as_bytes())
        .with_context(|| format!("invalid identity header {:?}", config.identity_header))?;
    let http = reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .build()
        .context("build upstream http client")?;

    let keys = Arc::new(
        JwksKeySet::fetch(http.clone(), config.jwks_url())
            .await
            .context("initial signing key discovery")?,
    );
    let cache = Arc::new(TtlMembershipCache::new());
    let groups = GroupApiClient::new(
        http,
        config.grafana_url.clone(),
        config.credentials.clone(),
        cache.clone(),
        config.membership_ttl,
    )
    .context("group api client")?;

    let tasks = vec![
        keys.clone()
            .spawn_refresh(config.jwks_refresh_interval, cancel.clone()),
        spawn_sweeper(cache, config.membership_sweep_interval, cancel),
    ];

    let state = AppState {
        enforcer: Enforcer::new(
            TokenValidator::new(keys.clone(), config.leeway_secs),
            Arc::new(groups),
        ),
        identity_header,
        keys,
    };
    Ok((state, tasks))
}

/// Serve the gateway until `shutdown` resolves, then stop every background task.
pub async fn run_with_shutdown<F>(config: GatewayConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("lbac-gateway", config.log_format)?;
    let cancel = CancellationToken::new();
    let (state, mut tasks) = build_state(&config, cancel.clone()).await?;

    if let Some(addr) = config.metrics_bind {
        let stop = cancel.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(err) =
                observability::serve_metrics(metrics_handle, addr, stop.cancelled_owned()).await
            {
                tracing::warn!(%addr, error = %err, "metrics listener failed");
            }
        }));
    }

    let app = build_router(state, labels_router());
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.bind_addr))?;
    tracing::info!(addr = %listener.local_addr()?, "gateway listening");

    let stop = cancel.clone();
    let result = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown.await;
            stop.cancel();
        })
        .await;

    cancel.cancel();
    join_background(tasks).await;
    tracing::info!("gateway stopped");
    result.context("serve gateway")
}

/// Wait for background tasks, logging any that panicked or were aborted.
pub(crate) async fn join_background(tasks: Vec<JoinHandle<()>>) -> usize {
    let mut failed = 0;
    for task in tasks {
        if let Err(err) = task.await {
            failed += 1;
            tracing::warn!(error = %err, "background task ended abnormally");
        }
    }
    failed
}

//! Observability wiring for the gateway service.
//!
//! # Purpose
//! Initializes tracing (text or JSON output) and the Prometheus metrics
//! recorder, and serves the optional `/metrics` endpoint.
//!
//! # Notes
//! Initialization is guarded by `OnceLock` to keep startup idempotent in tests.
use crate::config::LogFormat;
use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static OBS_INIT: OnceLock<()> = OnceLock::new();

pub fn init_observability(
    service_name: &str,
    format: LogFormat,
) -> anyhow::Result<PrometheusHandle> {
    OBS_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let (text_layer, json_layer) = match format {
            LogFormat::Text => (Some(tracing_subscriber::fmt::layer()), None),
            LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
        };
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(text_layer)
            .with(json_layer)
            .try_init();
        tracing::debug!(service = service_name, ?format, "tracing initialized");
    });

    install_metrics_recorder()
}

pub async fn serve_metrics<F>(
    handle: PrometheusHandle,
    addr: SocketAddr,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "metrics listening");
    serve_metrics_with_listener(handle, listener, shutdown).await
}

async fn serve_metrics_with_listener<F>(
    handle: PrometheusHandle,
    listener: tokio::net::TcpListener,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = axum::Router::new().route(
        "/metrics",
        axum::routing::get(move || async move { handle.render() }),
    );
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
}

fn install_metrics_recorder() -> anyhow::Result<PrometheusHandle> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("install metrics recorder")?;
    let _ = METRICS_HANDLE.set(handle.clone());
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::{Duration, Instant};
    use tokio::sync::oneshot;

    async fn wait_for_listen(addr: SocketAddr) -> Result<(), String> {
        let deadline = Instant::now() + Duration::from_secs(1);
        loop {
            if tokio::net::TcpStream::connect(addr).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(format!("server never became ready at {}", addr));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    #[serial]
    fn install_metrics_recorder_is_cached() {
        let handle1 = install_metrics_recorder().expect("recorder");
        let handle2 = install_metrics_recorder().expect("recorder");
        let _ = (handle1.render(), handle2.render());
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn init_observability_is_idempotent() {
        let handle1 = init_observability("lbac-gateway-test", LogFormat::Json).expect("init");
        let handle2 = init_observability("lbac-gateway-test", LogFormat::Text).expect("init");
        let _ = (handle1.render(), handle2.render());
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn serve_metrics_renders_recorded_counters() {
        let handle = init_observability("lbac-gateway-test", LogFormat::Text).expect("init");
        metrics::counter!("lbac_enforce_total", "outcome" => "ok").increment(1);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_metrics_with_listener(handle, listener, async move {
            let _ = shutdown_rx.await;
        }));
        wait_for_listen(addr).await.expect("server ready");

        let body = reqwest::Client::new()
            .get(format!("http://{addr}/metrics"))
            .send()
            .await
            .expect("GET /metrics")
            .error_for_status()
            .expect("metrics status")
            .text()
            .await
            .expect("body");
        assert!(body.contains("lbac_enforce_total"));

        let _ = shutdown_tx.send(());
        let _ = tokio::time::timeout(Duration::from_secs(1), server)
            .await
            .expect("server shutdown");
    }
}

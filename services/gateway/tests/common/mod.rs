use gateway::config::{DEFAULT_IDENTITY_HEADER, GatewayConfig, LogFormat};
use lbac_authz::ServiceCredentials;
use lbac_authz::testutil::{MockIdentityProvider, TEST_SERVICE_PASS, TEST_SERVICE_USER};
use std::time::Duration;

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub fn test_config(idp: &MockIdentityProvider) -> GatewayConfig {
    GatewayConfig {
        bind_addr: "127.0.0.1:0".parse().expect("bind"),
        metrics_bind: None,
        grafana_url: reqwest::Url::parse(&idp.base_url()).expect("grafana url"),
        credentials: ServiceCredentials {
            username: TEST_SERVICE_USER.to_string(),
            password: TEST_SERVICE_PASS.to_string(),
        },
        identity_header: DEFAULT_IDENTITY_HEADER.to_string(),
        jwks_refresh_interval: Duration::from_secs(3600),
        membership_ttl: Duration::from_secs(300),
        membership_sweep_interval: Duration::from_secs(600),
        upstream_timeout: Duration::from_millis(500),
        leeway_secs: 60,
        log_format: LogFormat::Text,
    }
}

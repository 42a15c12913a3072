use anyhow::{Context, Result, bail};
use lbac_authz::{
    DEFAULT_LEEWAY_SECONDS, DEFAULT_MEMBERSHIP_TTL, DEFAULT_SWEEP_INTERVAL,
    DEFAULT_UPSTREAM_TIMEOUT, ServiceCredentials,
};
use reqwest::Url;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_IDENTITY_HEADER: &str = "X-Grafana-Id";
pub const JWKS_PATH: &str = "api/signing-keys/keys";
pub const DEFAULT_JWKS_REFRESH: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => bail!("unknown log format {other:?}"),
        }
    }
}

// Gateway configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    // Main HTTP listener.
    pub bind_addr: SocketAddr,
    // Prometheus listener; disabled when unset.
    pub metrics_bind: Option<SocketAddr>,
    // Identity provider base URL (keys and group API).
    pub grafana_url: Url,
    // Basic auth credentials for the group API.
    pub credentials: ServiceCredentials,
    // Inbound header carrying the identity assertion.
    pub identity_header: String,
    pub jwks_refresh_interval: Duration,
    pub membership_ttl: Duration,
    pub membership_sweep_interval: Duration,
    pub upstream_timeout: Duration,
    pub leeway_secs: u64,
    pub log_format: LogFormat,
}

#[derive(Debug, Deserialize)]
struct GatewayConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    grafana_url: Option<String>,
    identity_header: Option<String>,
    jwks_refresh_secs: Option<u64>,
    membership_ttl_secs: Option<u64>,
    membership_sweep_secs: Option<u64>,
    upstream_timeout_ms: Option<u64>,
    leeway_secs: Option<u64>,
    log_format: Option<LogFormat>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("LBAC_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| "parse LBAC_BIND")?;
        let metrics_bind = match std::env::var("LBAC_METRICS_BIND") {
            Ok(value) if !value.is_empty() => {
                Some(value.parse().with_context(|| "parse LBAC_METRICS_BIND")?)
            }
            _ => None,
        };
        let grafana_url = std::env::var("LBAC_GRAFANA_URL").with_context(|| "LBAC_GRAFANA_URL not set")?;
        let grafana_url = parse_grafana_url(&grafana_url)?;
        let credentials = ServiceCredentials {
            username: required_env("GRAFANA_ADMIN_USER")?,
            password: required_env("GRAFANA_ADMIN_PASS")?,
        };
        let identity_header = std::env::var("LBAC_IDENTITY_HEADER")
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_IDENTITY_HEADER.to_string());
        let log_format = match std::env::var("LBAC_LOG_FORMAT") {
            Ok(value) => LogFormat::parse(&value)?,
            Err(_) => LogFormat::Text,
        };
        Ok(Self {
            bind_addr,
            metrics_bind,
            grafana_url,
            credentials,
            identity_header,
            jwks_refresh_interval: env_secs("LBAC_JWKS_REFRESH_SECS")
                .unwrap_or(DEFAULT_JWKS_REFRESH),
            membership_ttl: env_secs("LBAC_MEMBERSHIP_TTL_SECS").unwrap_or(DEFAULT_MEMBERSHIP_TTL),
            membership_sweep_interval: env_secs("LBAC_MEMBERSHIP_SWEEP_SECS")
                .unwrap_or(DEFAULT_SWEEP_INTERVAL),
            upstream_timeout: env_u64("LBAC_UPSTREAM_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT),
            leeway_secs: std::env::var("LBAC_LEEWAY_SECS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(DEFAULT_LEEWAY_SECONDS),
            log_format,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("LBAC_CONFIG") {
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read LBAC_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        Ok(config)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: GatewayConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse gateway config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = Some(value.parse().with_context(|| "parse metrics_bind")?);
        }
        if let Some(value) = override_cfg.grafana_url {
            self.grafana_url = parse_grafana_url(&value)?;
        }
        if let Some(value) = override_cfg.identity_header.filter(|value| !value.is_empty()) {
            self.identity_header = value;
        }
        if let Some(value) = override_cfg.jwks_refresh_secs.filter(|value| *value > 0) {
            self.jwks_refresh_interval = Duration::from_secs(value);
        }
        if let Some(value) = override_cfg.membership_ttl_secs.filter(|value| *value > 0) {
            self.membership_ttl = Duration::from_secs(value);
        }
        if let Some(value) = override_cfg.membership_sweep_secs.filter(|value| *value > 0) {
            self.membership_sweep_interval = Duration::from_secs(value);
        }
        if let Some(value) = override_cfg.upstream_timeout_ms.filter(|value| *value > 0) {
            self.upstream_timeout = Duration::from_millis(value);
        }
        if let Some(value) = override_cfg.leeway_secs {
            self.leeway_secs = value;
        }
        if let Some(value) = override_cfg.log_format {
            self.log_format = value;
        }
        Ok(())
    }

    /// Key discovery document URL on the identity provider.
    pub fn jwks_url(&self) -> String {
        format!(
            "{}/{JWKS_PATH}",
            self.grafana_url.as_str().trim_end_matches('/')
        )
    }
}

fn parse_grafana_url(value: &str) -> Result<Url> {
    let url = Url::parse(value).with_context(|| format!("parse grafana url {value:?}"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        bail!(
            "invalid scheme for grafana url {value:?}, only 'http' and 'https' are supported"
        );
    }
    Ok(url)
}

fn required_env(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => bail!("{key} not present"),
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
}

fn env_secs(key: &str) -> Option<Duration> {
    env_u64(key).map(Duration::from_secs)
}

//! Group membership lookup against the identity provider's group API.
//!
//! # Purpose
//! Resolves the full membership list of a caller, consulting the membership
//! cache first and calling `GET /api/users/<id>/teams` with service
//! credentials on a miss.
//!
//! # Key invariants
//! - A cache hit performs no network I/O.
//! - Only successful, fully decoded responses are cached; failures are never
//!   cached so an upstream outage heals on the next request.
//! - The request carries a bounded timeout set on the HTTP client. Dropping
//!   the returned future (for example when the inbound request is cancelled)
//!   aborts the outbound call.
//!
//! # Security
//! Service credentials are sent as HTTP Basic auth and never logged.
use crate::cache::{MembershipCache, Memberships};
use crate::errors::FetchError;
use crate::types::{CallerId, GroupMembership};
use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;

/// Default timeout for one membership request.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait MembershipFetcher: Send + Sync {
    async fn fetch(&self, caller_id: &CallerId) -> Result<Memberships, FetchError>;
}

/// Static credentials for the group API.
#[derive(Clone)]
pub struct ServiceCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub struct GroupApiClient {
    client: reqwest::Client,
    base_url: Url,
    credentials: ServiceCredentials,
    cache: Arc<dyn MembershipCache>,
    ttl: Duration,
}

impl GroupApiClient {
    /// # Errors
    /// - `FetchError::Url` if `base_url` cannot carry path segments.
    pub fn new(
        client: reqwest::Client,
        base_url: Url,
        credentials: ServiceCredentials,
        cache: Arc<dyn MembershipCache>,
        ttl: Duration,
    ) -> Result<Self, FetchError> {
        if base_url.cannot_be_a_base() {
            return Err(FetchError::Url(base_url.to_string()));
        }
        Ok(Self {
            client,
            base_url,
            credentials,
            cache,
            ttl,
        })
    }

    fn teams_url(&self, caller_id: &CallerId) -> Result<Url, FetchError> {
        // `extend` drops `.` and `..`, which would address a different endpoint.
        if matches!(caller_id.as_str(), "" | "." | "..") {
            return Err(FetchError::Url(format!(
                "caller id {:?} is not a path segment",
                caller_id.as_str()
            )));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "users", caller_id.as_str(), "teams"]);
        Ok(url)
    }

    async fn fetch_remote(&self, caller_id: &CallerId) -> Result<Vec<GroupMembership>, FetchError> {
        let url = self.teams_url(caller_id)?;
        let response = self
            .client
            .get(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await
            .map_err(FetchError::Http)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        response.json().await.map_err(FetchError::Decode)
    }
}

#[async_trait]
impl MembershipFetcher for GroupApiClient {
    async fn fetch(&self, caller_id: &CallerId) -> Result<Memberships, FetchError> {
        if let Some(memberships) = self.cache.get(caller_id) {
            metrics::counter!("lbac_membership_cache_total", "result" => "hit").increment(1);
            return Ok(memberships);
        }
        metrics::counter!("lbac_membership_cache_total", "result" => "miss").increment(1);

        match self.fetch_remote(caller_id).await {
            Ok(memberships) => {
                metrics::counter!("lbac_membership_fetch_total", "result" => "ok").increment(1);
                let memberships = Arc::new(memberships);
                self.cache.set(caller_id, memberships.clone(), self.ttl);
                Ok(memberships)
            }
            Err(err) => {
                metrics::counter!("lbac_membership_fetch_total", "result" => "error").increment(1);
                tracing::error!(caller_id = %caller_id, error = %err, "membership lookup failed");
                Err(err)
            }
        }
    }
}

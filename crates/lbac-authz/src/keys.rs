//! Signing key resolution backed by the identity provider's JWKS endpoint.
//!
//! # Purpose
//! Holds the current set of public signing keys and answers lookups by key id
//! without any network I/O on the request path.
//!
//! # Key invariants
//! - The first fetch happens at construction; construction fails if the
//!   discovery endpoint is unreachable or publishes no usable key.
//! - A refresh only replaces the held set when it succeeds with at least one
//!   usable key. Failed refreshes are logged and the previous set is kept.
//! - The held set is swapped as a whole, so a lookup never observes a mix of
//!   two documents.
//!
//! # Concurrency model
//! Readers clone an `Arc` to the current key map under a short read lock.
//! The background refresh task runs until its [`CancellationToken`] fires and
//! never reports errors to request tasks.
use crate::errors::KeySetError;
use crate::jwks::{KeyMap, VerificationKey, key_map};
use jsonwebtoken::jwk::JwkSet;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lookup of verification keys by key id.
pub trait KeyResolver: Send + Sync {
    fn resolve(&self, kid: &str) -> Option<Arc<VerificationKey>>;
}

impl KeyResolver for HashMap<String, Arc<VerificationKey>> {
    fn resolve(&self, kid: &str) -> Option<Arc<VerificationKey>> {
        self.get(kid).cloned()
    }
}

/// Key set fetched from a JWKS URL and refreshed in the background.
pub struct JwksKeySet {
    url: String,
    client: reqwest::Client,
    keys: RwLock<Arc<KeyMap>>,
}

impl std::fmt::Debug for JwksKeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksKeySet")
            .field("url", &self.url)
            .field("keys", &self.len())
            .finish()
    }
}

impl JwksKeySet {
    /// Fetch the discovery document once and build the key set.
    ///
    /// # Errors
    /// - `KeySetError::Http` / `KeySetError::Status` if the endpoint cannot be read.
    /// - `KeySetError::NoUsableKeys` if no published key can verify tokens.
    pub async fn fetch(client: reqwest::Client, url: impl Into<String>) -> Result<Self, KeySetError> {
        let url = url.into();
        let keys = fetch_key_map(&client, &url).await?;
        tracing::info!(%url, keys = keys.len(), "signing keys loaded");
        Ok(Self {
            url,
            client,
            keys: RwLock::new(Arc::new(keys)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    /// Refetch the document; on failure the current keys stay in place.
    pub async fn refresh(&self) -> Result<usize, KeySetError> {
        match fetch_key_map(&self.client, &self.url).await {
            Ok(keys) => {
                let count = keys.len();
                *self.keys.write() = Arc::new(keys);
                metrics::counter!("lbac_jwks_refresh_total", "result" => "ok").increment(1);
                tracing::debug!(url = %self.url, keys = count, "signing keys refreshed");
                Ok(count)
            }
            Err(err) => {
                metrics::counter!("lbac_jwks_refresh_total", "result" => "error").increment(1);
                tracing::warn!(
                    url = %self.url,
                    error = %err,
                    keys = self.len(),
                    "signing key refresh failed; keeping previous keys"
                );
                Err(err)
            }
        }
    }

    /// Spawn the periodic refresh loop.
    pub fn spawn_refresh(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately and the keys are already fresh.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("signing key refresh task shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let _ = self.refresh().await;
                    }
                }
            }
        })
    }
}

impl KeyResolver for JwksKeySet {
    fn resolve(&self, kid: &str) -> Option<Arc<VerificationKey>> {
        let keys = self.keys.read().clone();
        keys.get(kid).cloned()
    }
}

async fn fetch_key_map(client: &reqwest::Client, url: &str) -> Result<KeyMap, KeySetError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(KeySetError::Status(status.as_u16()));
    }
    let jwks: JwkSet = response.json().await?;
    let keys = key_map(&jwks);
    if keys.is_empty() {
        return Err(KeySetError::NoUsableKeys);
    }
    Ok(keys)
}

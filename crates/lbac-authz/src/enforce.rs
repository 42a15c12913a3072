//! Request-scoped enforcement pipeline.
//!
//! # Purpose
//! Turns a raw identity assertion into the label set the query-rewriting
//! proxy must enforce: verify the assertion, resolve the caller's
//! memberships, and keep only the groups in the claimed organization.
//!
//! # Key invariants
//! - Steps run strictly in order and the first failure ends the request.
//! - An empty scope is a rejection ([`EnforceError::NoScope`]); an
//!   unrestricted or best-guess label set is never produced.
use crate::errors::{AuthzResult, EnforceError};
use crate::membership::MembershipFetcher;
use crate::token::TokenValidator;
use crate::types::EnforcedLabelSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct Enforcer {
    validator: TokenValidator,
    memberships: Arc<dyn MembershipFetcher>,
}

impl Enforcer {
    pub fn new(validator: TokenValidator, memberships: Arc<dyn MembershipFetcher>) -> Self {
        Self {
            validator,
            memberships,
        }
    }

    /// Run the pipeline for one request's assertion header value.
    ///
    /// # Errors
    /// Each variant of [`EnforceError`] maps to one caller-visible
    /// [`FailureKind`](crate::FailureKind).
    pub async fn enforce(&self, assertion: Option<&[u8]>) -> AuthzResult<EnforcedLabelSet> {
        let result = self.run(assertion).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind().as_str(),
        };
        metrics::counter!("lbac_enforce_total", "outcome" => outcome).increment(1);
        result
    }

    async fn run(&self, assertion: Option<&[u8]>) -> AuthzResult<EnforcedLabelSet> {
        let identity = self.validator.validate(assertion).map_err(|err| {
            match err.kind() {
                crate::FailureKind::Internal => {
                    tracing::error!(error = %err, "identity assertion claims unusable");
                }
                _ => tracing::debug!(kind = err.kind().as_str(), "identity assertion rejected"),
            }
            EnforceError::from(err)
        })?;

        let memberships = self.memberships.fetch(&identity.caller_id).await?;

        EnforcedLabelSet::scoped(&memberships, identity.claimed_org_id).ok_or_else(|| {
            tracing::info!(
                caller_id = %identity.caller_id,
                org_id = identity.claimed_org_id,
                "caller has no group in claimed org"
            );
            EnforceError::NoScope {
                caller_id: identity.caller_id.to_string(),
                org_id: identity.claimed_org_id,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Memberships;
    use crate::errors::{FailureKind, FetchError};
    use crate::jwks::key_map;
    use crate::testutil::{TEST_KID, test_jwks, user_token};
    use crate::token::DEFAULT_LEEWAY_SECONDS;
    use crate::types::{CallerId, GroupMembership};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubFetcher {
        memberships: Mutex<HashMap<String, Vec<GroupMembership>>>,
        fail: Mutex<bool>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MembershipFetcher for StubFetcher {
        async fn fetch(&self, caller_id: &CallerId) -> Result<Memberships, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if *self.fail.lock() {
                return Err(FetchError::Status(502));
            }
            let memberships = self
                .memberships
                .lock()
                .get(caller_id.as_str())
                .cloned()
                .unwrap_or_default();
            Ok(Arc::new(memberships))
        }
    }

    fn enforcer(fetcher: Arc<StubFetcher>) -> Enforcer {
        let keys = key_map(&test_jwks(&[TEST_KID]));
        Enforcer::new(
            TokenValidator::new(Arc::new(keys), DEFAULT_LEEWAY_SECONDS),
            fetcher,
        )
    }

    fn stub_with(caller: &str, memberships: Vec<GroupMembership>) -> Arc<StubFetcher> {
        let fetcher = Arc::new(StubFetcher::default());
        fetcher
            .memberships
            .lock()
            .insert(caller.to_string(), memberships);
        fetcher
    }

    #[tokio::test]
    async fn publishes_groups_of_claimed_org_in_order() {
        let fetcher = stub_with(
            "42",
            vec![
                GroupMembership::new(1, 7, "team-a"),
                GroupMembership::new(2, 7, "team-b"),
                GroupMembership::new(3, 3, "team-c"),
            ],
        );
        let token = user_token("42", 7);
        let labels = enforcer(fetcher)
            .enforce(Some(token.as_bytes()))
            .await
            .expect("labels");
        assert_eq!(labels.values(), ["team-a", "team-b"]);
    }

    #[tokio::test]
    async fn scopes_across_many_orgs() {
        let fetcher = stub_with(
            "5",
            vec![
                GroupMembership::new(1, 1, "one"),
                GroupMembership::new(2, 2, "two-a"),
                GroupMembership::new(3, 3, "three"),
                GroupMembership::new(4, 2, "two-b"),
            ],
        );
        let token = user_token("5", 2);
        let labels = enforcer(fetcher)
            .enforce(Some(token.as_bytes()))
            .await
            .expect("labels");
        assert_eq!(labels.into_values(), vec!["two-a", "two-b"]);
    }

    #[tokio::test]
    async fn empty_scope_fails_closed() {
        let fetcher = stub_with("42", vec![GroupMembership::new(3, 3, "team-c")]);
        let token = user_token("42", 7);
        let err = enforcer(fetcher)
            .enforce(Some(token.as_bytes()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::NoScope);

        let fetcher = stub_with("42", vec![GroupMembership::new(1, 5, "team-x")]);
        let token = user_token("42", 9);
        let err = enforcer(fetcher)
            .enforce(Some(token.as_bytes()))
            .await
            .unwrap_err();
        assert!(matches!(err, EnforceError::NoScope { org_id: 9, .. }));
    }

    #[tokio::test]
    async fn credential_failures_skip_membership_lookup() {
        let fetcher = Arc::new(StubFetcher::default());
        let enforcer = enforcer(fetcher.clone());

        let err = enforcer.enforce(None).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::MissingCredential);
        let err = enforcer.enforce(Some(b"garbage")).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidCredential);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn upstream_failure_is_propagated() {
        let fetcher = Arc::new(StubFetcher::default());
        *fetcher.fail.lock() = true;
        let token = user_token("42", 7);
        let err = enforcer(fetcher)
            .enforce(Some(token.as_bytes()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::UpstreamUnavailable);
    }
}

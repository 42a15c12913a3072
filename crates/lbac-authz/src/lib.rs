//! Identity verification and group-membership scoping for label-based access
//! control.
//!
//! # Purpose
//! Derives the set of label values a caller may query: verifies the signed
//! identity assertion against the identity provider's rotating key set,
//! resolves the caller's group memberships (cached), and scopes them to the
//! organization the assertion claims.
//!
//! # How it fits
//! The gateway service runs an [`Enforcer`] per request and hands the
//! resulting [`EnforcedLabelSet`] to the label-injection proxy, which rewrites
//! queries with those values. Nothing here inspects or rewrites queries.
//!
//! # Key invariants
//! - Fail closed: every error, missing value, or empty scope is a rejection.
//! - No per-request network I/O for key lookup; keys refresh in the background.
//! - Memberships are cached unscoped; org filtering is recomputed per request.
//!
//! # Examples
//! ```rust,no_run
//! use lbac_authz::{
//!     Enforcer, GroupApiClient, JwksKeySet, ServiceCredentials, TokenValidator,
//!     TtlMembershipCache, DEFAULT_LEEWAY_SECONDS, DEFAULT_MEMBERSHIP_TTL,
//! };
//! use std::sync::Arc;
//!
//! async fn build() -> Result<Enforcer, Box<dyn std::error::Error>> {
//!     let http = reqwest::Client::new();
//!     let keys = JwksKeySet::fetch(http.clone(), "https://grafana.example/api/signing-keys/keys").await?;
//!     let groups = GroupApiClient::new(
//!         http,
//!         "https://grafana.example".parse()?,
//!         ServiceCredentials { username: "admin".into(), password: "secret".into() },
//!         Arc::new(TtlMembershipCache::new()),
//!         DEFAULT_MEMBERSHIP_TTL,
//!     )?;
//!     Ok(Enforcer::new(
//!         TokenValidator::new(Arc::new(keys), DEFAULT_LEEWAY_SECONDS),
//!         Arc::new(groups),
//!     ))
//! }
//! ```

mod cache;
mod claims;
mod enforce;
mod errors;
mod jwks;
mod keys;
mod membership;
mod token;
mod types;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use cache::{
    Clock, DEFAULT_MEMBERSHIP_TTL, DEFAULT_SWEEP_INTERVAL, MembershipCache, Memberships,
    SystemClock, TtlMembershipCache, spawn_sweeper,
};
pub use claims::{IdentityAssertion, ScopedId};
pub use enforce::Enforcer;
pub use errors::{
    AuthzResult, ClaimFormatError, EnforceError, FailureKind, FetchError, KeySetError, TokenError,
};
pub use jwks::{KeyMap, VerificationKey, key_map};
pub use keys::{JwksKeySet, KeyResolver};
pub use membership::{
    DEFAULT_UPSTREAM_TIMEOUT, GroupApiClient, MembershipFetcher, ServiceCredentials,
};
pub use token::{DEFAULT_LEEWAY_SECONDS, TokenValidator};
pub use types::{CallerId, EnforcedLabelSet, GroupMembership};

//! Identity and membership value types shared across the pipeline.
//!
//! # Purpose
//! Wraps the caller identifier and models the group memberships returned by
//! the group API, plus the label set handed to the query-rewriting proxy.
//!
//! # Key invariants
//! - A [`CallerId`] is never empty; it is only produced by claim parsing.
//! - An [`EnforcedLabelSet`] is never empty; an empty scope is a rejection,
//!   not an unrestricted view.
//!
//! # Examples
//! ```rust
//! use lbac_authz::{EnforcedLabelSet, GroupMembership};
//!
//! let memberships = vec![
//!     GroupMembership::new(1, 7, "team-a"),
//!     GroupMembership::new(2, 3, "team-c"),
//! ];
//! let labels = EnforcedLabelSet::scoped(&memberships, 7).expect("in scope");
//! assert_eq!(labels.values(), ["team-a".to_string()]);
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller identifier taken from the `<kind>:<id>` subject claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerId(String);

impl CallerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One group the caller belongs to, as returned by the group API.
///
/// Unknown response fields (email, avatar, member counts) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    #[serde(rename = "id")]
    pub group_id: i64,
    #[serde(rename = "orgId")]
    pub org_id: i64,
    pub name: String,
}

impl GroupMembership {
    pub fn new(group_id: i64, org_id: i64, name: impl Into<String>) -> Self {
        Self {
            group_id,
            org_id,
            name: name.into(),
        }
    }
}

/// Group names the caller holds within the claimed organization.
///
/// This is the value published into request extensions; the downstream
/// label-injection proxy reads it to decide which label values to enforce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnforcedLabelSet {
    values: Vec<String>,
}

impl EnforcedLabelSet {
    /// Filter memberships to one organization, keeping upstream order.
    ///
    /// Returns `None` when the caller has no group in `org_id`.
    pub fn scoped(memberships: &[GroupMembership], org_id: i64) -> Option<Self> {
        let values: Vec<String> = memberships
            .iter()
            .filter(|membership| membership.org_id == org_id)
            .map(|membership| membership.name.clone())
            .collect();
        if values.is_empty() {
            return None;
        }
        Some(Self { values })
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn into_values(self) -> Vec<String> {
        self.values
    }
}

//! Parsing of the verified assertion claims.
//!
//! The identity provider encodes both the subject and the audience as
//! `<kind>:<id>` (`user:42`, `org:7`). [`ScopedId::parse`] is the single place
//! that convention is interpreted.
use crate::errors::{ClaimFormatError, TokenError};
use crate::types::CallerId;
use serde::Deserialize;
use serde_json::Value;

/// A `<kind>:<id>` claim value split at its first colon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopedId<'a> {
    pub kind: &'a str,
    pub id: &'a str,
}

impl<'a> ScopedId<'a> {
    pub fn parse(value: &'a str) -> Result<Self, ClaimFormatError> {
        let (kind, id) = value
            .split_once(':')
            .ok_or_else(|| ClaimFormatError::MissingSeparator(value.to_string()))?;
        if kind.is_empty() {
            return Err(ClaimFormatError::EmptyKind(value.to_string()));
        }
        if id.is_empty() {
            return Err(ClaimFormatError::EmptyId(value.to_string()));
        }
        Ok(Self { kind, id })
    }
}

/// A fully verified identity assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityAssertion {
    pub caller_id: CallerId,
    pub claimed_org_id: i64,
}

/// Claims read after signature verification.
///
/// Kept as raw JSON so a wrongly typed `sub`/`aud` surfaces as a claim error
/// rather than a decode (credential) error.
#[derive(Debug, Deserialize)]
pub(crate) struct AssertionClaims {
    #[serde(default)]
    sub: Option<Value>,
    #[serde(default)]
    aud: Option<Value>,
}

impl AssertionClaims {
    pub(crate) fn into_assertion(self) -> Result<IdentityAssertion, TokenError> {
        let caller_id = subject_caller_id(self.sub.as_ref())?;
        let claimed_org_id = audience_org_id(self.aud.as_ref())?;
        Ok(IdentityAssertion {
            caller_id,
            claimed_org_id,
        })
    }
}

fn subject_caller_id(sub: Option<&Value>) -> Result<CallerId, TokenError> {
    let sub = sub
        .and_then(Value::as_str)
        .ok_or(TokenError::MissingSubject)?;
    let scoped = ScopedId::parse(sub).map_err(TokenError::MalformedSubject)?;
    // The caller id becomes a URL path segment; `.` and `..` cannot be one.
    if matches!(scoped.id, "." | "..") {
        return Err(TokenError::MalformedSubject(
            ClaimFormatError::DotSegmentId(sub.to_string()),
        ));
    }
    Ok(CallerId::new(scoped.id))
}

fn audience_org_id(aud: Option<&Value>) -> Result<i64, TokenError> {
    // RFC 7519 allows a string or an array; either way exactly one value.
    let values: Vec<&Value> = match aud {
        None | Some(Value::Null) => return Err(TokenError::MissingAudience),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(value) => vec![value],
    };
    if values.len() != 1 {
        return Err(TokenError::AudienceCount(values.len()));
    }
    let audience = values[0].as_str().ok_or_else(|| {
        TokenError::MalformedAudience(ClaimFormatError::MissingSeparator(values[0].to_string()))
    })?;
    let scoped = ScopedId::parse(audience).map_err(TokenError::MalformedAudience)?;
    let digits = scoped.id.strip_prefix('-').unwrap_or(scoped.id);
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(TokenError::InvalidOrgId(scoped.id.to_string()));
    }
    scoped
        .id
        .parse::<i64>()
        .map_err(|_| TokenError::InvalidOrgId(scoped.id.to_string()))
}

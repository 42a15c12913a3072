use thiserror::Error;

/// Caller-visible rejection classes.
///
/// Every failure of the enforcement pipeline collapses into exactly one of
/// these; the serving layer maps them onto HTTP statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    MissingCredential,
    InvalidCredential,
    Internal,
    UpstreamUnavailable,
    NoScope,
}

impl FailureKind {
    /// Stable label used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MissingCredential => "missing_credential",
            FailureKind::InvalidCredential => "invalid_credential",
            FailureKind::Internal => "internal",
            FailureKind::UpstreamUnavailable => "upstream_unavailable",
            FailureKind::NoScope => "no_scope",
        }
    }
}

#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("key discovery request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("key discovery returned status {0}")]
    Status(u16),
    #[error("key discovery document has no usable keys")]
    NoUsableKeys,
}

/// Shape errors of a `<kind>:<id>` claim value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimFormatError {
    #[error("claim value {0:?} has no ':' separator")]
    MissingSeparator(String),
    #[error("claim value {0:?} has an empty kind")]
    EmptyKind(String),
    #[error("claim value {0:?} has an empty id")]
    EmptyId(String),
    #[error("claim value {0:?} has a dot-segment id")]
    DotSegmentId(String),
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("missing identity assertion")]
    Missing,
    #[error("invalid identity assertion: {0}")]
    Invalid(String),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("missing subject claim")]
    MissingSubject,
    #[error("malformed subject claim: {0}")]
    MalformedSubject(ClaimFormatError),
    #[error("missing audience claim")]
    MissingAudience,
    #[error("audience claim must hold exactly one value, got {0}")]
    AudienceCount(usize),
    #[error("malformed audience claim: {0}")]
    MalformedAudience(ClaimFormatError),
    #[error("audience org id {0:?} is not an integer")]
    InvalidOrgId(String),
}

impl TokenError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TokenError::Missing => FailureKind::MissingCredential,
            TokenError::Invalid(_) | TokenError::Jwt(_) => FailureKind::InvalidCredential,
            TokenError::MissingSubject
            | TokenError::MalformedSubject(_)
            | TokenError::MissingAudience
            | TokenError::AudienceCount(_)
            | TokenError::MalformedAudience(_)
            | TokenError::InvalidOrgId(_) => FailureKind::Internal,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid membership url: {0}")]
    Url(String),
    #[error("membership request failed: {0}")]
    Http(#[source] reqwest::Error),
    #[error("membership api returned status {0}")]
    Status(u16),
    #[error("membership response unparseable: {0}")]
    Decode(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum EnforceError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("caller {caller_id} is not a member of any group in org {org_id}")]
    NoScope { caller_id: String, org_id: i64 },
}

impl EnforceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            EnforceError::Token(err) => err.kind(),
            EnforceError::Fetch(_) => FailureKind::UpstreamUnavailable,
            EnforceError::NoScope { .. } => FailureKind::NoScope,
        }
    }
}

pub type AuthzResult<T> = Result<T, EnforceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_errors_classify_by_cause() {
        assert_eq!(TokenError::Missing.kind(), FailureKind::MissingCredential);
        assert_eq!(
            TokenError::Invalid("unknown kid".to_string()).kind(),
            FailureKind::InvalidCredential
        );
        assert_eq!(TokenError::MissingSubject.kind(), FailureKind::Internal);
        assert_eq!(TokenError::AudienceCount(2).kind(), FailureKind::Internal);
        assert_eq!(
            TokenError::InvalidOrgId("x".to_string()).kind(),
            FailureKind::Internal
        );
    }

    #[test]
    fn enforce_errors_classify() {
        let err = EnforceError::Fetch(FetchError::Status(503));
        assert_eq!(err.kind(), FailureKind::UpstreamUnavailable);

        let err = EnforceError::NoScope {
            caller_id: "42".to_string(),
            org_id: 9,
        };
        assert_eq!(err.kind(), FailureKind::NoScope);
        assert_eq!(
            err.to_string(),
            "caller 42 is not a member of any group in org 9"
        );
    }

    #[test]
    fn failure_kind_labels_are_distinct() {
        let kinds = [
            FailureKind::MissingCredential,
            FailureKind::InvalidCredential,
            FailureKind::Internal,
            FailureKind::UpstreamUnavailable,
            FailureKind::NoScope,
        ];
        let labels: std::collections::HashSet<_> = kinds.iter().map(|k| k.as_str()).collect();
        assert_eq!(labels.len(), kinds.len());
    }
}

use crate::claims::{AssertionClaims, IdentityAssertion};
use crate::errors::TokenError;
use crate::keys::KeyResolver;
use jsonwebtoken::{Algorithm, Validation};
use std::sync::Arc;

pub const DEFAULT_LEEWAY_SECONDS: u64 = 60;

/// Verifies identity assertions against the current signing keys.
///
/// Every parse, key lookup, or signature failure is reported as
/// [`TokenError::Invalid`] / [`TokenError::Jwt`] so callers see one class of
/// credential rejection. Claim shape problems are reported separately as
/// internal failures because they point at an incompatible issuer.
#[derive(Clone)]
pub struct TokenValidator {
    keys: Arc<dyn KeyResolver>,
    leeway: u64,
}

impl TokenValidator {
    pub fn new(keys: Arc<dyn KeyResolver>, leeway: u64) -> Self {
        Self { keys, leeway }
    }

    pub fn validate(&self, raw: Option<&[u8]>) -> Result<IdentityAssertion, TokenError> {
        let raw = match raw {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Err(TokenError::Missing),
        };
        let token = std::str::from_utf8(raw)
            .map_err(|_| TokenError::Invalid("assertion is not utf-8".to_string()))?;

        let header = jsonwebtoken::decode_header(token)?;
        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| TokenError::Invalid("missing key id".to_string()))?;
        let key = self
            .keys
            .resolve(kid)
            .ok_or_else(|| TokenError::Invalid(format!("unknown key id {kid}")))?;
        if !is_algorithm_allowed(header.alg) || !key.accepts(header.alg) {
            return Err(TokenError::Invalid(format!(
                "algorithm {:?} not accepted for key {kid}",
                header.alg
            )));
        }

        let mut validation = Validation::new(header.alg);
        // The audience carries the org scope and is checked during claim parsing.
        validation.validate_aud = false;
        validation.validate_nbf = true;
        validation.leeway = self.leeway;
        let token = jsonwebtoken::decode::<AssertionClaims>(token, &key.decoding_key, &validation)?;
        token.claims.into_assertion()
    }
}

fn is_algorithm_allowed(alg: Algorithm) -> bool {
    !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

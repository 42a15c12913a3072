//! Conversion of a published JWK set into verification keys.
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm};
use std::collections::HashMap;
use std::sync::Arc;

/// A public key resolved from the discovery document.
#[derive(Clone)]
pub struct VerificationKey {
    pub kid: String,
    /// `alg` published alongside the key, if any.
    pub key_algorithm: Option<KeyAlgorithm>,
    pub(crate) params: KeyType,
    pub decoding_key: DecodingKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyType {
    Rsa,
    EllipticCurve,
    OctetKeyPair,
}

impl VerificationKey {
    pub fn from_jwk(jwk: &Jwk) -> Option<Self> {
        let kid = jwk.common.key_id.clone()?;
        let params = match &jwk.algorithm {
            AlgorithmParameters::RSA(_) => KeyType::Rsa,
            AlgorithmParameters::EllipticCurve(_) => KeyType::EllipticCurve,
            AlgorithmParameters::OctetKeyPair(_) => KeyType::OctetKeyPair,
            // Shared secrets are never published as verification keys.
            AlgorithmParameters::OctetKey(_) => return None,
        };
        let decoding_key = DecodingKey::from_jwk(jwk).ok()?;
        Some(Self {
            kid,
            key_algorithm: jwk.common.key_algorithm,
            params,
            decoding_key,
        })
    }

    /// Whether a token signed with `alg` may be verified with this key.
    pub fn accepts(&self, alg: Algorithm) -> bool {
        let family_ok = match alg {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => self.params == KeyType::Rsa,
            Algorithm::ES256 | Algorithm::ES384 => self.params == KeyType::EllipticCurve,
            Algorithm::EdDSA => self.params == KeyType::OctetKeyPair,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => false,
        };
        if !family_ok {
            return false;
        }
        match self.key_algorithm {
            None => true,
            Some(key_alg) => key_algorithm_matches(key_alg, alg),
        }
    }
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("key_algorithm", &self.key_algorithm)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

fn key_algorithm_matches(key_alg: KeyAlgorithm, alg: Algorithm) -> bool {
    matches!(
        (key_alg, alg),
        (KeyAlgorithm::RS256, Algorithm::RS256)
            | (KeyAlgorithm::RS384, Algorithm::RS384)
            | (KeyAlgorithm::RS512, Algorithm::RS512)
            | (KeyAlgorithm::PS256, Algorithm::PS256)
            | (KeyAlgorithm::PS384, Algorithm::PS384)
            | (KeyAlgorithm::PS512, Algorithm::PS512)
            | (KeyAlgorithm::ES256, Algorithm::ES256)
            | (KeyAlgorithm::ES384, Algorithm::ES384)
            | (KeyAlgorithm::EdDSA, Algorithm::EdDSA)
    )
}

/// Key identifier to key, built from one discovery document.
pub type KeyMap = HashMap<String, Arc<VerificationKey>>;

/// Convert every usable key in `jwks`; unusable entries are skipped.
pub fn key_map(jwks: &JwkSet) -> KeyMap {
    let mut keys = KeyMap::new();
    for jwk in &jwks.keys {
        match VerificationKey::from_jwk(jwk) {
            Some(key) => {
                keys.insert(key.kid.clone(), Arc::new(key));
            }
            None => {
                tracing::warn!(
                    kid = jwk.common.key_id.as_deref().unwrap_or("<none>"),
                    "skipping unusable signing key"
                );
            }
        }
    }
    keys
}

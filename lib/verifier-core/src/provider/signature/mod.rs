//! Signature-algorithm registry: dispatches a declared JWS algorithm name or
//! COSE `alg` header integer to the matching verification routine. Unknown
//! algorithms fail with a typed error, there is no fallback default.

use std::sync::Arc;

use thiserror::Error;
use verifier_crypto::{CryptoProvider, SignerError};

use super::key_resolver::ResolvedPublicKey;

#[cfg(test)]
mod test;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Signature algorithm not supported: `{0}`")]
    AlgorithmNotSupported(String),
    #[error("Resolved key cannot be used with algorithm `{0}`")]
    KeyAlgorithmMismatch(String),
    #[error("Signer error: `{0}`")]
    Signer(#[from] SignerError),
}

// COSE algorithm identifiers (RFC 9053)
const COSE_ALG_ES256: i64 = -7;
const COSE_ALG_EDDSA: i64 = -8;
const COSE_ALG_ES256K: i64 = -47;
const COSE_ALG_PS256: i64 = -37;
const COSE_ALG_RS256: i64 = -257;

pub struct SignatureVerifierProvider {
    crypto: Arc<dyn CryptoProvider>,
}

impl SignatureVerifierProvider {
    pub fn new(crypto: Arc<dyn CryptoProvider>) -> Self {
        Self { crypto }
    }

    /// Verifies `signature` over `input` with the key material, dispatching
    /// on the JWS algorithm name.
    pub fn verify_jose(
        &self,
        algorithm: &str,
        input: &[u8],
        signature: &[u8],
        key: &ResolvedPublicKey,
    ) -> Result<(), SignatureError> {
        let (signer_algorithm, key_matches) = match algorithm {
            "RS256" => ("RS256", matches!(key, ResolvedPublicKey::Rsa { .. })),
            "PS256" => ("PS256", matches!(key, ResolvedPublicKey::Rsa { .. })),
            "EdDSA" | "Ed25519" => ("Ed25519", matches!(key, ResolvedPublicKey::Ed25519 { .. })),
            "ES256" => ("ES256", matches!(key, ResolvedPublicKey::EcP256 { .. })),
            "ES256K" => (
                "ES256K",
                matches!(key, ResolvedPublicKey::EcSecp256k1 { .. }),
            ),
            other => return Err(SignatureError::AlgorithmNotSupported(other.to_string())),
        };

        if !key_matches {
            return Err(SignatureError::KeyAlgorithmMismatch(algorithm.to_string()));
        }

        let signer = self
            .crypto
            .get_signer(signer_algorithm)
            .map_err(|_| SignatureError::AlgorithmNotSupported(algorithm.to_string()))?;

        Ok(signer.verify(input, signature, key.key_bytes())?)
    }

    /// COSE variant of [`Self::verify_jose`], keyed by the protected-header
    /// `alg` integer.
    pub fn verify_cose(
        &self,
        algorithm: i64,
        input: &[u8],
        signature: &[u8],
        key: &ResolvedPublicKey,
    ) -> Result<(), SignatureError> {
        let jose_name = jose_name_from_cose(algorithm)
            .ok_or_else(|| SignatureError::AlgorithmNotSupported(algorithm.to_string()))?;

        self.verify_jose(jose_name, input, signature, key)
    }
}

pub fn jose_name_from_cose(algorithm: i64) -> Option<&'static str> {
    match algorithm {
        COSE_ALG_ES256 => Some("ES256"),
        COSE_ALG_EDDSA => Some("EdDSA"),
        COSE_ALG_ES256K => Some("ES256K"),
        COSE_ALG_PS256 => Some("PS256"),
        COSE_ALG_RS256 => Some("RS256"),
        _ => None,
    }
}

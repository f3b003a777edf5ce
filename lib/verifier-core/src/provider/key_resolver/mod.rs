//! Public-key resolution: maps a verification-method reference (DID URL or
//! HTTPS URL) to algorithm-tagged key material. Resolution is polymorphic
//! over the reference scheme; every resolver rejects ambiguous or missing
//! key material instead of guessing.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use url::Url;

use super::caching_loader::ResolverError;
use super::http_client;
use crate::util::encoding::EncodingError;

pub mod common;
pub mod https;
pub mod jwk;
pub mod key;
pub mod web;


#[derive(Debug, Error)]
pub enum KeyResolutionError {
    #[error("Public key not found: `{0}`")]
    KeyNotFound(String),
    #[error("Public key type not supported: `{0}`")]
    KeyTypeUnsupported(String),
    #[error("Resolution failed: `{0}`")]
    ResolutionFailed(String),
    #[error("Invalid key reference: `{0}`")]
    InvalidReference(String),
    #[error("HTTP client error: `{0}`")]
    Http(#[from] http_client::Error),
    #[error("Resolver error: `{0}`")]
    Resolver(#[from] ResolverError),
    #[error("Encoding error: `{0}`")]
    Encoding(#[from] EncodingError),
    #[error("JSON error: `{0}`")]
    Json(#[from] serde_json::Error),
}

/// Algorithm-tagged public key material, valid for a single verification
/// call; never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedPublicKey {
    /// DER-encoded SubjectPublicKeyInfo.
    Rsa { spki_der: Vec<u8> },
    /// Raw 32-byte point.
    Ed25519 { raw: Vec<u8> },
    /// SEC1-encoded P-256 point.
    EcP256 { sec1: Vec<u8> },
    /// SEC1-encoded secp256k1 point.
    EcSecp256k1 { sec1: Vec<u8> },
}

const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

impl ResolvedPublicKey {
    /// Bytes in the encoding the matching signer expects.
    pub fn key_bytes(&self) -> &[u8] {
        match self {
            Self::Rsa { spki_der } => spki_der,
            Self::Ed25519 { raw } => raw,
            Self::EcP256 { sec1 } => sec1,
            Self::EcSecp256k1 { sec1 } => sec1,
        }
    }

    /// X.509 SubjectPublicKeyInfo encoding, for the key types carrying
    /// enough information to synthesize one.
    pub fn spki_der(&self) -> Option<Vec<u8>> {
        match self {
            Self::Rsa { spki_der } => Some(spki_der.clone()),
            Self::Ed25519 { raw } => {
                let mut der = Vec::with_capacity(ED25519_SPKI_PREFIX.len() + raw.len());
                der.extend_from_slice(&ED25519_SPKI_PREFIX);
                der.extend_from_slice(raw);
                Some(der)
            }
            _ => None,
        }
    }

    /// Name of the signer able to verify with this key.
    pub fn signer_algorithm(&self) -> &'static str {
        match self {
            Self::Rsa { .. } => "RS256",
            Self::Ed25519 { .. } => "Ed25519",
            Self::EcP256 { .. } => "ES256",
            Self::EcSecp256k1 { .. } => "ES256K",
        }
    }
}

#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait::async_trait]
pub trait KeyResolver: Send + Sync {
    /// Resolves `reference` to public key material; `key_id` narrows the
    /// selection when the reference alone is not fully qualified.
    async fn resolve<'a>(
        &self,
        reference: &str,
        key_id: Option<&'a str>,
    ) -> Result<ResolvedPublicKey, KeyResolutionError>;
}

/// Dispatches on the reference scheme: `did:<method>:…` to the registered
/// DID method resolver, bare `http(s)://` to the URL resolver.
pub struct KeyResolverProvider {
    resolvers: HashMap<String, Arc<dyn KeyResolver>>,
    url_resolver: Option<Arc<dyn KeyResolver>>,
}

impl KeyResolverProvider {
    pub fn new(
        resolvers: HashMap<String, Arc<dyn KeyResolver>>,
        url_resolver: Option<Arc<dyn KeyResolver>>,
    ) -> Self {
        Self {
            resolvers,
            url_resolver,
        }
    }

    pub async fn resolve(
        &self,
        reference: &str,
        key_id: Option<&str>,
    ) -> Result<ResolvedPublicKey, KeyResolutionError> {
        if Url::parse(reference).is_ok_and(|url| url.scheme() == "http" || url.scheme() == "https")
        {
            let resolver = self.url_resolver.as_ref().ok_or_else(|| {
                KeyResolutionError::ResolutionFailed(
                    "No resolver registered for URL references".to_string(),
                )
            })?;
            return resolver.resolve(reference, key_id).await;
        }

        let method = did_method_from_reference(reference)?;
        let resolver = self.resolvers.get(&method).ok_or_else(|| {
            KeyResolutionError::ResolutionFailed(format!("Unsupported did method `{method}`"))
        })?;

        resolver.resolve(reference, key_id).await
    }
}

fn did_method_from_reference(reference: &str) -> Result<String, KeyResolutionError> {
    let mut parts = reference.splitn(3, ':');

    if parts.next() != Some("did") {
        return Err(KeyResolutionError::InvalidReference(reference.to_string()));
    }

    parts
        .next()
        .filter(|method| !method.is_empty())
        .map(str::to_lowercase)
        .ok_or_else(|| KeyResolutionError::InvalidReference(reference.to_string()))
}

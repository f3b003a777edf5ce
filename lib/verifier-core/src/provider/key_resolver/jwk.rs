//! did:jwk resolution: the method-specific identifier is a base64url-encoded
//! JWK. Only `OKP/Ed25519` and `EC` (P-256, secp256k1) keys are accepted.

use async_trait::async_trait;

use super::common::{key_from_jwk, PublicKeyJwk};
use super::{KeyResolutionError, KeyResolver, ResolvedPublicKey};
use crate::util::encoding::decode_base64url;

pub struct JwkDidResolver {}

#[async_trait]
impl KeyResolver for JwkDidResolver {
    async fn resolve<'a>(
        &self,
        reference: &str,
        _key_id: Option<&'a str>,
    ) -> Result<ResolvedPublicKey, KeyResolutionError> {
        let did = reference.split('#').next().unwrap_or(reference);

        let method_specific_id = did
            .strip_prefix("did:jwk:")
            .ok_or_else(|| KeyResolutionError::InvalidReference(did.to_string()))?;

        let decoded = decode_base64url(method_specific_id)?;
        let jwk: PublicKeyJwk = serde_json::from_slice(&decoded)?;

        match jwk.kty.as_str() {
            "OKP" | "EC" => key_from_jwk(&jwk),
            other => Err(KeyResolutionError::KeyTypeUnsupported(format!(
                "did:jwk does not support kty `{other}`"
            ))),
        }
    }
}

//! did:key resolution. Only the Ed25519 multicodec (`0xed 0x01`) is
//! supported; the raw 32-byte key is wrapped into an X.509
//! SubjectPublicKeyInfo by [`ResolvedPublicKey::spki_der`].

use async_trait::async_trait;

use super::common::MULTICODEC_ED25519;
use super::{KeyResolutionError, KeyResolver, ResolvedPublicKey};
use crate::util::encoding::decode_multibase;

pub struct KeyDidResolver {}

#[async_trait]
impl KeyResolver for KeyDidResolver {
    async fn resolve<'a>(
        &self,
        reference: &str,
        _key_id: Option<&'a str>,
    ) -> Result<ResolvedPublicKey, KeyResolutionError> {
        let did = reference.split('#').next().unwrap_or(reference);

        let method_specific_id = did
            .strip_prefix("did:key:")
            .ok_or_else(|| KeyResolutionError::InvalidReference(did.to_string()))?;

        let decoded = decode_multibase(method_specific_id)?;

        let Some((prefix, key)) = decoded
            .split_at_checked(2)
            .filter(|(prefix, _)| *prefix == MULTICODEC_ED25519.as_slice())
        else {
            return Err(KeyResolutionError::KeyTypeUnsupported(
                "did:key only supports the Ed25519 multicodec".to_string(),
            ));
        };

        if key.len() != 32 {
            return Err(KeyResolutionError::ResolutionFailed(format!(
                "Ed25519 key must be exactly 32 bytes, got {}",
                key.len()
            )));
        }

        Ok(ResolvedPublicKey::Ed25519 { raw: key.to_vec() })
    }
}

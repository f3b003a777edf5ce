//! Resolution of bare `http(s)://` verification-method references. The
//! response may be a DID-document, a single verification-method object or a
//! bare JWK; key-material preference order matches did:web.

use std::sync::Arc;

use async_trait::async_trait;

use super::common::{
    key_from_jwk, key_from_verification_method, select_verification_method, DidDocument,
    PublicKeyJwk, VerificationMethod,
};
use super::{KeyResolutionError, KeyResolver, ResolvedPublicKey};
use crate::provider::http_client::{self, HttpClient};

pub struct HttpsKeyResolver {
    client: Arc<dyn HttpClient>,
}

impl HttpsKeyResolver {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeyResolver for HttpsKeyResolver {
    async fn resolve<'a>(
        &self,
        reference: &str,
        key_id: Option<&'a str>,
    ) -> Result<ResolvedPublicKey, KeyResolutionError> {
        let response = http_client::get(self.client.clone(), reference)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = serde_json::from_slice(&response.body)?;

        if body.get("verificationMethod").is_some() {
            let document: DidDocument = serde_json::from_value(body)?;
            let target = key_id.unwrap_or(reference);
            let method = select_verification_method(&document, target)?;
            return key_from_verification_method(method);
        }

        if body.get("id").is_some()
            && (body.get("publicKeyJwk").is_some()
                || body.get("publicKeyHex").is_some()
                || body.get("publicKeyPem").is_some()
                || body.get("publicKeyMultibase").is_some())
        {
            let method: VerificationMethod = serde_json::from_value(body)?;
            return key_from_verification_method(&method);
        }

        if body.get("kty").is_some() {
            let jwk: PublicKeyJwk = serde_json::from_value(body)?;
            return key_from_jwk(&jwk);
        }

        Err(KeyResolutionError::KeyNotFound(format!(
            "no key material at `{reference}`"
        )))
    }
}

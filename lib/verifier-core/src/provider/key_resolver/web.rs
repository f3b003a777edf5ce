//! did:web resolution: the method-specific identifier maps to an HTTPS
//! location hosting `did.json`, with `.well-known` as the default path.

use std::sync::Arc;

use async_trait::async_trait;

use super::common::{key_from_verification_method, select_verification_method, DidDocument};
use super::{KeyResolutionError, KeyResolver, ResolvedPublicKey};
use crate::provider::caching_loader::{CachingLoader, ResolveResult, Resolver, ResolverError};
use crate::provider::http_client::{self, HttpClient};

pub struct WebDidResolver {
    caching_loader: CachingLoader,
    document_resolver: Arc<DidDocumentResolver>,
}

struct DidDocumentResolver {
    client: Arc<dyn HttpClient>,
}

#[async_trait]
impl Resolver for DidDocumentResolver {
    async fn do_resolve(&self, url: &str) -> Result<ResolveResult, ResolverError> {
        let response = http_client::get(self.client.clone(), url)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?;

        Ok(ResolveResult {
            media_type: response.header_get("Content-Type").cloned(),
            content: response.body,
        })
    }
}

impl WebDidResolver {
    pub fn new(client: Arc<dyn HttpClient>, caching_loader: CachingLoader) -> Self {
        Self {
            caching_loader,
            document_resolver: Arc::new(DidDocumentResolver { client }),
        }
    }

    async fn fetch_document(&self, url: &str) -> Result<DidDocument, KeyResolutionError> {
        let (content, _) = self
            .caching_loader
            .get(url, &*self.document_resolver)
            .await?;

        Ok(serde_json::from_slice(&content)?)
    }
}

#[async_trait]
impl KeyResolver for WebDidResolver {
    async fn resolve<'a>(
        &self,
        reference: &str,
        key_id: Option<&'a str>,
    ) -> Result<ResolvedPublicKey, KeyResolutionError> {
        let did = reference.split('#').next().unwrap_or(reference);
        let url = did_web_to_url(did)?;

        let document = self.fetch_document(&url).await?;

        // fully-qualified key id, falling back to the DID URL itself
        let target = key_id.unwrap_or(reference);
        let method = select_verification_method(&document, target)?;

        key_from_verification_method(method)
    }
}

/// `did:web:<domain>[:<path segments>]` to `https://<domain>/<path>/did.json`;
/// without path segments the document lives under `.well-known`.
fn did_web_to_url(did: &str) -> Result<String, KeyResolutionError> {
    let method_specific_id = did
        .strip_prefix("did:web:")
        .ok_or_else(|| KeyResolutionError::InvalidReference(did.to_string()))?;

    let mut segments = method_specific_id.split(':');
    let domain = segments
        .next()
        .filter(|domain| !domain.is_empty())
        .ok_or_else(|| KeyResolutionError::InvalidReference(did.to_string()))?
        .replace("%3A", ":")
        .replace("%3a", ":");

    let path = segments.collect::<Vec<_>>().join("/");
    let path = if path.is_empty() {
        ".well-known".to_string()
    } else {
        path
    };

    Ok(format!("https://{domain}/{path}/did.json"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_did_web_to_url_well_known_default() {
        assert_eq!(
            did_web_to_url("did:web:issuer.example.com").unwrap(),
            "https://issuer.example.com/.well-known/did.json"
        );
    }

    #[test]
    fn test_did_web_to_url_with_path() {
        assert_eq!(
            did_web_to_url("did:web:issuer.example.com:users:alice").unwrap(),
            "https://issuer.example.com/users/alice/did.json"
        );
    }

    #[test]
    fn test_did_web_to_url_with_encoded_port() {
        assert_eq!(
            did_web_to_url("did:web:issuer.example.com%3A8443").unwrap(),
            "https://issuer.example.com:8443/.well-known/did.json"
        );
    }

    #[test]
    fn test_did_web_to_url_rejects_other_methods() {
        assert!(matches!(
            did_web_to_url("did:key:z6Mk"),
            Err(KeyResolutionError::InvalidReference(_))
        ));
    }
}

//! JSON-LD document loader used during canonicalization. The well-known
//! credential and security-suite contexts are served from an offline copy so
//! canonicalization of ordinary credentials performs no network round-trips;
//! anything else is fetched through the TTL'd caching loader.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::provider::caching_loader::{CachingLoader, ResolveResult, Resolver, ResolverError};
use crate::provider::http_client::{self, HttpClient};

pub const CREDENTIALS_V1_URL: &str = "https://www.w3.org/2018/credentials/v1";
pub const CREDENTIALS_V2_URL: &str = "https://www.w3.org/ns/credentials/v2";
pub const SECURITY_JWS_2020_V1_URL: &str = "https://w3id.org/security/suites/jws-2020/v1";
pub const SECURITY_ED25519_2020_V1_URL: &str = "https://w3id.org/security/suites/ed25519-2020/v1";
pub const SECURITY_DATA_INTEGRITY_V2_URL: &str = "https://w3id.org/security/data-integrity/v2";

pub const CONTEXT_CREDENTIALS_V1: &str = include_str!("contexts/credentials_v1.json");
pub const CONTEXT_CREDENTIALS_V2: &str = include_str!("contexts/credentials_v2.json");
pub const CONTEXT_SECURITY_JWS_2020_V1: &str = include_str!("contexts/security_jws_2020_v1.json");
pub const CONTEXT_SECURITY_ED25519_2020_V1: &str =
    include_str!("contexts/security_ed25519_2020_v1.json");
pub const CONTEXT_SECURITY_DATA_INTEGRITY_V2: &str =
    include_str!("contexts/security_data_integrity_v2.json");

struct ContextResolver {
    client: Arc<dyn HttpClient>,
}

#[async_trait]
impl Resolver for ContextResolver {
    async fn do_resolve(&self, url: &str) -> Result<ResolveResult, ResolverError> {
        let response = http_client::get(self.client.clone(), url)
            .header("Accept", "application/ld+json")
            .send()
            .await?
            .error_for_status()?;

        Ok(ResolveResult {
            media_type: response.header_get("Content-Type").cloned(),
            content: response.body,
        })
    }
}

#[derive(Clone)]
pub struct ContextCache {
    offline: Arc<HashMap<String, json_syntax::Value>>,
    caching_loader: CachingLoader,
    resolver: Arc<ContextResolver>,
}

impl ContextCache {
    pub fn new(caching_loader: CachingLoader, client: Arc<dyn HttpClient>) -> Self {
        let offline = [
            (CREDENTIALS_V1_URL, CONTEXT_CREDENTIALS_V1),
            (CREDENTIALS_V2_URL, CONTEXT_CREDENTIALS_V2),
            (SECURITY_JWS_2020_V1_URL, CONTEXT_SECURITY_JWS_2020_V1),
            (
                SECURITY_ED25519_2020_V1_URL,
                CONTEXT_SECURITY_ED25519_2020_V1,
            ),
            (
                SECURITY_DATA_INTEGRITY_V2_URL,
                CONTEXT_SECURITY_DATA_INTEGRITY_V2,
            ),
        ]
        .into_iter()
        .map(|(url, content)| {
            let value = json_syntax::Value::from_str(content)
                .unwrap_or_else(|_| unreachable!("embedded context `{url}` is valid JSON"));
            (url.to_string(), value)
        })
        .collect();

        Self {
            offline: Arc::new(offline),
            caching_loader,
            resolver: Arc::new(ContextResolver { client }),
        }
    }
}

impl json_ld::Loader for ContextCache {
    async fn load(
        &self,
        url: &json_ld::Iri,
    ) -> Result<json_ld::RemoteDocument, json_ld::LoadError> {
        if let Some(document) = self.offline.get(url.as_str()) {
            return Ok(json_ld::RemoteDocument::new(
                Some(url.to_owned()),
                None,
                document.clone(),
            ));
        }

        tracing::debug!("loading remote JSON-LD context {url}");
        let (content, _) = self
            .caching_loader
            .get(url.as_str(), &*self.resolver)
            .await
            .map_err(|error| json_ld::LoadError::new(url.to_owned(), error))?;

        let content = String::from_utf8(content)
            .map_err(|error| json_ld::LoadError::new(url.to_owned(), error))?;
        let document = json_syntax::Value::from_str(&content).map_err(|error| {
            json_ld::LoadError::new(
                url.to_owned(),
                ResolverError::InvalidResponse(error.to_string()),
            )
        })?;

        Ok(json_ld::RemoteDocument::new(
            Some(url.to_owned()),
            None,
            document,
        ))
    }
}

#[cfg(test)]
mod test {
    use json_ld::Loader;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::provider::http_client::reqwest_client::ReqwestClient;

    fn cache_with_client(client: Arc<dyn HttpClient>) -> ContextCache {
        ContextCache::new(CachingLoader::default(), client)
    }

    #[tokio::test]
    async fn test_known_context_is_served_offline() {
        let cache = cache_with_client(Arc::new(ReqwestClient::default()));

        let url = json_ld::Iri::new(CREDENTIALS_V2_URL).unwrap();
        let document = cache.load(url).await.unwrap();

        assert!(document.document().as_object().is_some());
    }

    #[tokio::test]
    async fn test_unknown_context_is_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/context/v1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"@context": {"@vocab": "https://vocab.example/#"}}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = cache_with_client(Arc::new(ReqwestClient::default()));

        let context_url = format!("{}/context/v1", server.uri());
        let url = json_ld::Iri::new(context_url.as_str()).unwrap();

        // second load hits the cache, the mock expects exactly one request
        cache.load(url).await.unwrap();
        let document = cache.load(url).await.unwrap();

        assert!(document.document().as_object().is_some());
    }

    #[tokio::test]
    async fn test_unreachable_context_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let cache = cache_with_client(Arc::new(ReqwestClient::default()));

        let context_url = format!("{}/missing", server.uri());
        let url = json_ld::Iri::new(context_url.as_str()).unwrap();

        assert!(cache.load(url).await.is_err());
    }
}

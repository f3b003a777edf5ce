//! TTL-bounded cache for remote documents (DID documents, JSON-LD contexts,
//! status lists). Entries are immutable once inserted and replaced wholesale
//! on refresh; the map is safe for concurrent read/insert.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::http_client;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("HTTP client error: `{0}`")]
    Http(#[from] http_client::Error),
    #[error("Invalid response: `{0}`")]
    InvalidResponse(String),
    #[error("JSON error: `{0}`")]
    Json(#[from] serde_json::Error),
}

#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn do_resolve(&self, url: &str) -> Result<ResolveResult, ResolverError>;
}

#[derive(Clone, Debug)]
pub struct ResolveResult {
    pub content: Vec<u8>,
    pub media_type: Option<String>,
}

#[derive(Clone)]
struct CacheEntry {
    content: Vec<u8>,
    media_type: Option<String>,
    last_modified: OffsetDateTime,
}

#[derive(Clone)]
pub struct CachingLoader {
    cache_size: usize,
    refresh_after: time::Duration,
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl CachingLoader {
    pub fn new(cache_size: usize, refresh_after: time::Duration) -> Self {
        Self {
            cache_size,
            refresh_after,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(
        &self,
        url: &str,
        resolver: &dyn Resolver,
    ) -> Result<(Vec<u8>, Option<String>), ResolverError> {
        if let Some(entry) = self.entries.read().await.get(url) {
            if OffsetDateTime::now_utc() - entry.last_modified <= self.refresh_after {
                return Ok((entry.content.clone(), entry.media_type.clone()));
            }
        }

        let resolved = resolver.do_resolve(url).await?;
        self.insert(url, &resolved).await;

        Ok((resolved.content, resolved.media_type))
    }

    async fn insert(&self, url: &str, resolved: &ResolveResult) {
        let mut entries = self.entries.write().await;

        entries.insert(
            url.to_string(),
            CacheEntry {
                content: resolved.content.clone(),
                media_type: resolved.media_type.clone(),
                last_modified: OffsetDateTime::now_utc(),
            },
        );

        while entries.len() > self.cache_size {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_modified)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    tracing::debug!("evicting cached document {key}");
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl Default for CachingLoader {
    fn default() -> Self {
        Self::new(100, time::Duration::minutes(5))
    }
}

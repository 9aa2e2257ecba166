use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Where the full text behind an evidence entry comes from.
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn fetch_detail(&self, filename: &str) -> Result<String>;
}

/// Lazy, cache-by-filename access to evidence details. Only successful
/// fetches are cached, so a failed expansion can be retried.
#[derive(Clone)]
pub struct EvidenceDetails {
    source: Arc<dyn DetailSource>,
    cache: Arc<Mutex<HashMap<String, String>>>,
}

impl EvidenceDetails {
    pub fn new(source: Arc<dyn DetailSource>) -> Self {
        Self {
            source,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The cache lock is never held across the fetch, so a slow filename does
    /// not hold up lookups of others.
    pub async fn get_section_detail(&self, key: &str) -> Result<String> {
        if let Some(detail) = self.cache.lock().await.get(key) {
            return Ok(detail.clone());
        }

        tracing::debug!(filename = key, "fetching evidence detail");
        let detail = self.source.fetch_detail(key).await?;
        let mut cache = self.cache.lock().await;
        Ok(cache.entry(key.to_string()).or_insert(detail).clone())
    }

    pub async fn is_cached(&self, key: &str) -> bool {
        self.cache.lock().await.contains_key(key)
    }
}

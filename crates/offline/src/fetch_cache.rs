//! Response cache with cache-first and network-first strategies.
//!
//! Entries are stored in a [`KeyValueStore`] under `fetch-{uuid-v5(url)}` so
//! any URL maps to a valid storage key.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use storefront_storage::{KeyValueStore, StorageError, load_json, save_json};

const KEY_PREFIX: &str = "fetch-";

const STATIC_EXTENSIONS: &[&str] = &[
    "js", "css", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "woff", "woff2",
];

/// A response as returned by the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A response as held in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    pub cached_at: DateTime<Utc>,
}

impl CachedResponse {
    fn from_network(url: &str, response: FetchedResponse) -> Self {
        Self {
            url: url.to_owned(),
            status: response.status,
            content_type: response.content_type,
            body: response.body,
            cached_at: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.cached_at
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network request for {url} failed: {message}")]
    Network { url: String, message: String },
}

impl FetchError {
    pub fn network(url: impl Into<String>, message: impl ToString) -> Self {
        FetchError::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

/// Performs the actual network request.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedResponse, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Serve a fresh cached copy without touching the network.
    CacheFirst,
    /// Always try the network; fall back to any cached copy on failure.
    NetworkFirst,
}

impl FetchStrategy {
    /// Static assets are cache-first; API calls and pages are network-first.
    pub fn for_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if path.contains("/_next/static/") {
            return FetchStrategy::CacheFirst;
        }
        let is_static = path
            .rsplit('/')
            .next()
            .and_then(|segment| segment.rsplit_once('.'))
            .is_some_and(|(_, ext)| STATIC_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_static {
            FetchStrategy::CacheFirst
        } else {
            FetchStrategy::NetworkFirst
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Network,
    Cache,
    /// Network failed; served a cached copy regardless of age.
    CacheFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    pub source: FetchSource,
}

impl FetchOutcome {
    fn from_cache(entry: CachedResponse, source: FetchSource) -> Self {
        Self {
            status: entry.status,
            content_type: entry.content_type,
            body: entry.body,
            source,
        }
    }

    fn from_network(response: FetchedResponse) -> Self {
        Self {
            status: response.status,
            content_type: response.content_type,
            body: response.body,
            source: FetchSource::Network,
        }
    }
}

/// Response cache over a [`KeyValueStore`].
///
/// Cache reads and writes never fail a fetch: storage errors are logged and
/// treated as a miss.
#[derive(Debug)]
pub struct FetchCache<S> {
    store: S,
    max_age: Duration,
}

impl<S: KeyValueStore> FetchCache<S> {
    pub fn new(store: S, max_age: Duration) -> Self {
        Self { store, max_age }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Fetch `url` with the strategy [`FetchStrategy::for_url`] picks.
    pub async fn get<F>(&self, fetcher: &F, url: &str) -> Result<FetchOutcome, FetchError>
    where
        F: Fetcher + ?Sized,
    {
        self.fetch(fetcher, url, FetchStrategy::for_url(url)).await
    }

    pub async fn fetch<F>(
        &self,
        fetcher: &F,
        url: &str,
        strategy: FetchStrategy,
    ) -> Result<FetchOutcome, FetchError>
    where
        F: Fetcher + ?Sized,
    {
        match strategy {
            FetchStrategy::CacheFirst => {
                let cached = self.cached(url);
                if let Some(entry) = cached.as_ref().filter(|entry| entry.age() <= self.max_age) {
                    tracing::debug!(url, "cache hit");
                    return Ok(FetchOutcome::from_cache(entry.clone(), FetchSource::Cache));
                }
                match fetcher.fetch(url).await {
                    Ok(response) => Ok(self.store_response(url, response)),
                    Err(err) => match cached {
                        Some(stale) => {
                            tracing::debug!(url, error = %err, "serving stale cache entry");
                            Ok(FetchOutcome::from_cache(stale, FetchSource::CacheFallback))
                        }
                        None => Err(err),
                    },
                }
            }
            FetchStrategy::NetworkFirst => match fetcher.fetch(url).await {
                Ok(response) => Ok(self.store_response(url, response)),
                Err(err) => match self.cached(url) {
                    Some(entry) => {
                        tracing::debug!(url, error = %err, "network failed; serving cached copy");
                        Ok(FetchOutcome::from_cache(entry, FetchSource::CacheFallback))
                    }
                    None => Err(err),
                },
            },
        }
    }

    /// The cached entry for `url`, regardless of age.
    pub fn cached(&self, url: &str) -> Option<CachedResponse> {
        match load_json::<CachedResponse, _>(&self.store, &cache_key(url)) {
            Ok(entry) => entry.filter(|entry| entry.url == url),
            Err(err) => {
                tracing::warn!(url, error = %err, "unreadable cache entry");
                None
            }
        }
    }

    pub fn invalidate(&self, url: &str) -> Result<(), StorageError> {
        self.store.remove(&cache_key(url))
    }

    /// Remove entries older than `max_age`. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, StorageError> {
        let mut removed = 0;
        for key in self.store.keys()? {
            if !key.starts_with(KEY_PREFIX) {
                continue;
            }
            let expired = match load_json::<CachedResponse, _>(&self.store, &key) {
                Ok(Some(entry)) => entry.age() > self.max_age,
                Ok(None) => false,
                Err(_) => true,
            };
            if expired {
                self.store.remove(&key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn store_response(&self, url: &str, response: FetchedResponse) -> FetchOutcome {
        if !response.is_success() {
            return FetchOutcome::from_network(response);
        }
        let entry = CachedResponse::from_network(url, response.clone());
        if let Err(err) = save_json(&self.store, &cache_key(url), &entry) {
            tracing::warn!(url, error = %err, "failed to cache response");
        }
        FetchOutcome::from_network(response)
    }
}

fn cache_key(url: &str) -> String {
    format!(
        "{KEY_PREFIX}{}",
        Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes()).simple()
    )
}

//! Image fetching for link previews.

use std::future::Future;
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use lru::LruCache;
use tracing::{debug, trace};

use crate::error::ClientError;
use crate::uri::ImageSize;

pub type ImageFuture<'a> = Pin<Box<dyn Future<Output = Result<Bytes, ClientError>> + Send + 'a>>;

/// Fetches image bytes. Implementations are shared with worker tasks and
/// must not hold on to UI state.
///
/// `size` comes from the link's `#w=;h=[;round]` hint; loaders that can
/// fetch a scaled or rounded variant should honour it.
pub trait ImageLoader: Send + Sync {
    fn load(&self, url: String, size: ImageSize) -> ImageFuture<'_>;
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

const CACHE_CAPACITY: usize = 64;

pub struct HttpImageLoader {
    client: reqwest::Client,
    cache: Mutex<LruCache<String, Bytes>>,
}

impl HttpImageLoader {
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
        })
    }

    fn cached(&self, url: &str) -> Option<Bytes> {
        self.cache.lock().ok().and_then(|mut cache| cache.get(url).cloned())
    }

    fn remember(&self, url: String, bytes: Bytes) {
        if let Ok(mut cache) = self.cache.lock() {
            match cache.push(url.clone(), bytes) {
                Some((evicted, _)) if evicted != url => {
                    trace!(url = %evicted, "Image evicted from cache");
                }
                _ => {}
            }
        }
    }

    pub async fn fetch(&self, url: &str) -> Result<Bytes, ClientError> {
        if let Some(bytes) = self.cached(url) {
            trace!(url, "Image cache hit");
            return Ok(bytes);
        }

        let resp = self.client.get(url).send().await?.error_for_status()?;
        let bytes = resp.bytes().await?;
        debug!(url, size = bytes.len(), "Fetched image");

        self.remember(url.to_string(), bytes.clone());
        Ok(bytes)
    }
}

impl ImageLoader for HttpImageLoader {
    fn load(&self, url: String, size: ImageSize) -> ImageFuture<'_> {
        trace!(url, width = size.width, height = size.height, round = size.round, "Loading image");
        Box::pin(async move { self.fetch(&url).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_evicts_least_recently_used() {
        let loader = HttpImageLoader::new(Duration::from_secs(15)).unwrap();
        if let Ok(mut cache) = loader.cache.lock() {
            cache.resize(NonZeroUsize::new(2).unwrap());
        }
        loader.remember("a".into(), Bytes::from_static(b"1"));
        loader.remember("b".into(), Bytes::from_static(b"2"));

        // Touch "a" so "b" is the oldest.
        assert_eq!(loader.cached("a"), Some(Bytes::from_static(b"1")));
        loader.remember("c".into(), Bytes::from_static(b"3"));

        assert!(loader.cached("b").is_none());
        assert!(loader.cached("a").is_some());
        assert!(loader.cached("c").is_some());
    }

    #[test]
    fn test_cache_overwrite_replaces_bytes() {
        let loader = HttpImageLoader::new(Duration::from_secs(15)).unwrap();
        loader.remember("a".into(), Bytes::from_static(b"1"));
        loader.remember("a".into(), Bytes::from_static(b"2"));
        assert_eq!(loader.cache.lock().unwrap().len(), 1);
        assert_eq!(loader.cached("a"), Some(Bytes::from_static(b"2")));
    }

    #[tokio::test]
    async fn test_loader_serves_cached_bytes() {
        let loader = HttpImageLoader::new(Duration::from_secs(15)).unwrap();
        let url = "https://images.invalid/cat.png".to_string();
        loader.remember(url.clone(), Bytes::from_static(b"png"));

        let bytes = loader.load(url, ImageSize::default()).await.unwrap();
        assert_eq!(&bytes[..], b"png");
    }
}

//! Cache wrappers that misbehave on purpose, for exercising the store's race handling.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::lock::Mutex;

use crate::repository::{CacheError, Entry, KeyValueCache, MemoryCache};

/// Loses every compare-and-swap and counts how often it was asked.
#[derive(Clone)]
pub struct LosingCache<V> {
    inner: MemoryCache<V>,
    swaps: Arc<AtomicUsize>,
}

impl<V: Clone> LosingCache<V> {
    pub fn new(inner: MemoryCache<V>) -> Self {
        Self {
            inner,
            swaps: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn swaps(&self) -> usize {
        self.swaps.load(Ordering::SeqCst)
    }
}

impl<V: Clone + PartialEq> KeyValueCache<V> for LosingCache<V> {
    async fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: V) -> Result<(), CacheError> {
        self.inner.put(key, value).await
    }

    async fn put_if_absent(&self, key: &str, value: V) -> Result<bool, CacheError> {
        self.inner.put_if_absent(key, value).await
    }

    async fn compare_and_swap(&self, _key: &str, _expected: &V, _new: V) -> Result<bool, CacheError> {
        self.swaps.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }
}

/// Lets a rival writer store its value right before the next compare-and-swap
/// on a chosen key, so that swap sees a changed value and loses.
#[derive(Clone)]
pub struct RivalCache<V> {
    inner: MemoryCache<V>,
    rival: Arc<Mutex<Option<(String, V)>>>,
    swaps: Arc<AtomicUsize>,
}

impl<V: Clone> RivalCache<V> {
    pub fn new(inner: MemoryCache<V>) -> Self {
        Self {
            inner,
            rival: Arc::new(Mutex::new(None)),
            swaps: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn arm(&self, key: &str, value: V) {
        *self.rival.lock().await = Some((key.to_string(), value));
    }

    pub fn swaps(&self) -> usize {
        self.swaps.load(Ordering::SeqCst)
    }
}

impl<V: Clone + PartialEq> KeyValueCache<V> for RivalCache<V> {
    async fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: V) -> Result<(), CacheError> {
        self.inner.put(key, value).await
    }

    async fn put_if_absent(&self, key: &str, value: V) -> Result<bool, CacheError> {
        self.inner.put_if_absent(key, value).await
    }

    async fn compare_and_swap(&self, key: &str, expected: &V, new: V) -> Result<bool, CacheError> {
        self.swaps.fetch_add(1, Ordering::SeqCst);
        let pending = {
            let mut rival = self.rival.lock().await;
            let armed = matches!(rival.as_ref(), Some((rival_key, _)) if rival_key == key);
            if armed { rival.take() } else { None }
        };
        if let Some((rival_key, value)) = pending {
            self.inner.put(&rival_key, value).await?;
        }
        self.inner.compare_and_swap(key, expected, new).await
    }
}

/// Lets a rival store an [`Entry`] in the metadata cache right before the next
/// put-if-absent on a chosen key of this cache.
#[derive(Clone)]
pub struct IntrudingCache<V> {
    inner: MemoryCache<V>,
    metadata: MemoryCache<Entry>,
    rival: Arc<Mutex<Option<(String, Entry)>>>,
}

impl<V: Clone> IntrudingCache<V> {
    pub fn new(inner: MemoryCache<V>, metadata: MemoryCache<Entry>) -> Self {
        Self {
            inner,
            metadata,
            rival: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn arm(&self, key: &str, entry: Entry) {
        *self.rival.lock().await = Some((key.to_string(), entry));
    }
}

impl<V: Clone + PartialEq> KeyValueCache<V> for IntrudingCache<V> {
    async fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: V) -> Result<(), CacheError> {
        self.inner.put(key, value).await
    }

    async fn put_if_absent(&self, key: &str, value: V) -> Result<bool, CacheError> {
        let pending = {
            let mut rival = self.rival.lock().await;
            let armed = matches!(rival.as_ref(), Some((rival_key, _)) if rival_key == key);
            if armed { rival.take() } else { None }
        };
        if let Some((rival_key, entry)) = pending {
            self.metadata.put_if_absent(&rival_key, entry).await?;
        }
        self.inner.put_if_absent(key, value).await
    }

    async fn compare_and_swap(&self, key: &str, expected: &V, new: V) -> Result<bool, CacheError> {
        self.inner.compare_and_swap(key, expected, new).await
    }
}

/// Every call fails as if the remote cache went away.
#[derive(Clone, Copy, Default)]
pub struct UnreachableCache;

impl UnreachableCache {
    fn error() -> CacheError {
        CacheError::Unreachable {
            cache: "unreachable".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
        }
    }
}

impl<V> KeyValueCache<V> for UnreachableCache {
    async fn get(&self, _key: &str) -> Result<Option<V>, CacheError> {
        Err(Self::error())
    }

    async fn put(&self, _key: &str, _value: V) -> Result<(), CacheError> {
        Err(Self::error())
    }

    async fn put_if_absent(&self, _key: &str, _value: V) -> Result<bool, CacheError> {
        Err(Self::error())
    }

    async fn compare_and_swap(&self, _key: &str, _expected: &V, _new: V) -> Result<bool, CacheError> {
        Err(Self::error())
    }
}

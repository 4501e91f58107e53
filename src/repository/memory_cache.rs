use std::sync::Arc;

use futures::lock::Mutex;
use hashlink::LinkedHashMap;
use tracing::debug;

use super::{CacheError, KeyValueCache};

/// In-process cache. Clones share the same storage, so one instance can be
/// handed to several clients (or worker threads) racing on the same keys.
pub struct MemoryCache<V> {
    name: Arc<str>,
    values: Arc<Mutex<LinkedHashMap<String, V>>>,
}

impl<V> Clone for MemoryCache<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            values: self.values.clone(),
        }
    }
}

impl<V: Clone> MemoryCache<V> {
    #[cfg(test)]
    pub fn new(name: &str) -> Self {
        Self::from_pairs(name, Vec::new())
    }

    pub fn from_pairs(name: &str, pairs: impl IntoIterator<Item = (String, V)>) -> Self {
        Self {
            name: Arc::from(name),
            values: Arc::new(Mutex::new(pairs.into_iter().collect())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of every stored pair, in insertion order.
    pub async fn pairs(&self) -> Vec<(String, V)> {
        self.values
            .lock()
            .await
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl<V: Clone + PartialEq> KeyValueCache<V> for MemoryCache<V> {
    async fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: V) -> Result<(), CacheError> {
        // `replace` keeps the original insertion position of an existing key
        self.values.lock().await.replace(key.to_string(), value);
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value: V) -> Result<bool, CacheError> {
        let mut values = self.values.lock().await;
        if values.contains_key(key) {
            debug!("{}: put-if-absent on '{}' found an existing value", self.name, key);
            return Ok(false);
        }
        values.insert(key.to_string(), value);
        Ok(true)
    }

    async fn compare_and_swap(&self, key: &str, expected: &V, new: V) -> Result<bool, CacheError> {
        let mut values = self.values.lock().await;
        match values.get_mut(key) {
            Some(current) if current == expected => {
                *current = new;
                Ok(true)
            }
            _ => {
                debug!("{}: compare-and-swap on '{}' lost", self.name, key);
                Ok(false)
            }
        }
    }
}

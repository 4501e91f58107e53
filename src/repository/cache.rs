use snafu::Snafu;

/// The contract a key/value cache has to offer for the metadata store to work on top of it.
///
/// Keys are absolute paths. Each key must behave linearizably: a successful write is
/// visible to every later read, and the two conditional writes are atomic per key.
/// Equality for [`compare_and_swap`](KeyValueCache::compare_and_swap) is full structural
/// equality of the stored value.
pub trait KeyValueCache<V> {
    async fn get(&self, key: &str) -> Result<Option<V>, CacheError>;

    /// Unconditional overwrite.
    async fn put(&self, key: &str, value: V) -> Result<(), CacheError>;

    /// Stores `value` only if nothing is stored under `key`. Returns whether it was stored.
    async fn put_if_absent(&self, key: &str, value: V) -> Result<bool, CacheError>;

    /// Replaces the value only if the stored one equals `expected`. Returns whether it was replaced.
    async fn compare_and_swap(&self, key: &str, expected: &V, new: V) -> Result<bool, CacheError>;
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CacheError {
    #[snafu(display("Cache '{}' is unreachable", cache))]
    Unreachable {
        cache: String,
        source: std::io::Error,
    },
}

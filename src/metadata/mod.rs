//! The filesystem metadata layer: listing, lookups and the conflict-safe mutations.

mod metadata_store;
mod outcome;
mod retry;
#[cfg(test)]
mod test_caches;

pub use metadata_store::{MetadataStore, RETRY_LIMIT, StoreError};
pub use outcome::{Applied, MutationOutcome, Rejection};

use snafu::{ResultExt, Snafu};
use tracing::{debug, info, warn};

use crate::paths::{ROOT, split_parent_and_name};
use crate::repository::{CacheError, Content, Entry, KeyValueCache};

use super::outcome::{Applied, LinkOutcome, MutationOutcome, Rejection};
use super::retry::{Attempt, attempt};

/// Additional rounds `add_child_to_parent` gets after its first one.
pub const RETRY_LIMIT: usize = 3;

/// Filesystem view over two caches: `metadata` holds an [`Entry`] per path,
/// `files` holds the [`Content`] of every file path.
///
/// Nothing is cached between calls. Every mutation re-reads the current value,
/// computes the next one and writes it with a conditional write, so concurrent
/// clients on other machines are coordinated by the caches alone.
pub struct MetadataStore<M, F> {
    metadata: M,
    files: F,
    retry_limit: usize,
}

impl<M, F> MetadataStore<M, F>
where
    M: KeyValueCache<Entry>,
    F: KeyValueCache<Content>,
{
    pub fn new(metadata: M, files: F) -> Self {
        Self {
            metadata,
            files,
            retry_limit: RETRY_LIMIT,
        }
    }

    pub fn with_retry_limit(mut self, retry_limit: usize) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    /// Makes sure `/` exists as a directory. Returns whether it had to be created.
    pub async fn ensure_root(&self) -> Result<bool, StoreError> {
        let created = self
            .metadata
            .put_if_absent(ROOT, Entry::directory(ROOT))
            .await
            .context(CacheAccessSnafu { path: ROOT })?;
        if created {
            info!("Created root directory entry");
        }
        Ok(created)
    }

    /// Names listed by the directory at `path`. A missing entry lists as empty.
    pub async fn list_directory(&self, path: &str) -> Result<Vec<String>, StoreError> {
        debug!("List {}", path);
        Ok(self
            .get_metadata(path)
            .await?
            .map(|entry| entry.children)
            .unwrap_or_default())
    }

    pub async fn get_metadata(&self, path: &str) -> Result<Option<Entry>, StoreError> {
        self.metadata
            .get(path)
            .await
            .context(CacheAccessSnafu { path })
    }

    pub async fn get_file_contents(&self, path: &str) -> Result<Option<Content>, StoreError> {
        debug!("Read {}", path);
        self.files.get(path).await.context(CacheAccessSnafu { path })
    }

    /// Replaces the contents of `path` if they still equal `expected`.
    ///
    /// A single attempt: losing the race is reported so the writer can re-read.
    /// Once the contents land the operation succeeds even if the size update loses.
    pub async fn save_file(
        &self,
        path: &str,
        expected: &Content,
        new: Content,
    ) -> Result<MutationOutcome, StoreError> {
        let new_size = new.byte_len();
        let swapped = self
            .files
            .compare_and_swap(path, expected, new)
            .await
            .context(CacheAccessSnafu { path })?;
        if !swapped {
            warn!("Refusing to save '{}': contents changed since they were read", path);
            return Ok(MutationOutcome::Rejected(Rejection::RemoteChanged));
        }

        let applied = match self.get_metadata(path).await? {
            None => {
                let (_, name) = split_parent_and_name(path);
                info!("'{}' had contents but no entry, writing one", path);
                self.metadata
                    .put_if_absent(path, Entry::file(name, new_size))
                    .await
                    .context(CacheAccessSnafu { path })?;
                Applied::Saved
            }
            Some(entry) if entry.size != expected.byte_len() => {
                debug!(
                    "Size of '{}' already moved on ({} != {}), leaving it",
                    path,
                    entry.size,
                    expected.byte_len()
                );
                Applied::SavedMetadataStale
            }
            Some(entry) => {
                let resized = entry.with_size(new_size);
                let updated = self
                    .metadata
                    .compare_and_swap(path, &entry, resized)
                    .await
                    .context(CacheAccessSnafu { path })?;
                if updated {
                    Applied::Saved
                } else {
                    debug!("Size update of '{}' lost to a concurrent writer", path);
                    Applied::SavedMetadataStale
                }
            }
        };

        info!("Saved {} ({} bytes)", path, new_size);
        Ok(MutationOutcome::Applied(applied))
    }

    /// Creates an empty file and lists it in its parent.
    pub async fn create_file(&self, path: &str) -> Result<MutationOutcome, StoreError> {
        let (parent, name) = split_parent_and_name(path);
        if name.is_empty() {
            return Ok(MutationOutcome::Rejected(Rejection::UnableToCreateFile));
        }
        if let Some(existing) = self.get_metadata(path).await? {
            if existing.is_directory {
                return Ok(MutationOutcome::Rejected(Rejection::DirectoryExists));
            }
        }

        let created = self
            .files
            .put_if_absent(path, Content::empty())
            .await
            .context(CacheAccessSnafu { path })?;
        if !created {
            info!("'{}' already has contents, checking that it is listed", path);
            let link = self.add_child_to_parent(path).await?;
            if !link.is_listed() {
                warn!("Existing file '{}' could not be listed in '{}': {}", path, parent, link);
            }
            return Ok(MutationOutcome::Rejected(Rejection::FileExists));
        }

        if !self.write_initial_file_entry(path, name).await? {
            warn!("'{}' became a directory while its file was being created", path);
            return Ok(MutationOutcome::Rejected(Rejection::DirectoryExists));
        }

        let link = self.add_child_to_parent(path).await?;
        if !link.is_listed() {
            warn!("File '{}' was created but is not listed in '{}': {}", path, parent, link);
            return Ok(MutationOutcome::Rejected(Rejection::UnableToCreateFile));
        }

        info!("Created file {}", path);
        Ok(MutationOutcome::Applied(Applied::FileCreated))
    }

    /// Creates an empty directory and lists it in its parent. Idempotent.
    pub async fn create_directory(&self, path: &str) -> Result<MutationOutcome, StoreError> {
        let (parent, name) = split_parent_and_name(path);
        if name.is_empty() {
            self.ensure_root().await?;
            return Ok(MutationOutcome::Applied(Applied::DirectoryExists));
        }

        let already_listed = self
            .get_metadata(parent)
            .await?
            .is_some_and(|parent_entry| parent_entry.has_child(name));
        if already_listed {
            match self.get_metadata(path).await? {
                Some(existing) if existing.is_directory => {
                    debug!("'{}' is already listed in '{}'", name, parent);
                    return Ok(MutationOutcome::Applied(Applied::DirectoryExists));
                }
                Some(_) => return Ok(MutationOutcome::Rejected(Rejection::FileExists)),
                None => debug!("'{}' is listed but has no entry yet, creating it", path),
            }
        }

        let created = self
            .metadata
            .put_if_absent(path, Entry::directory(name))
            .await
            .context(CacheAccessSnafu { path })?;
        let link = self.add_child_to_parent(path).await?;

        if !created {
            let existing_is_file = self
                .get_metadata(path)
                .await?
                .is_some_and(|existing| !existing.is_directory);
            if existing_is_file {
                return Ok(MutationOutcome::Rejected(Rejection::FileExists));
            }
            if link.is_listed() {
                return Ok(MutationOutcome::Applied(Applied::DirectoryExists));
            }
        }

        if !link.is_listed() {
            warn!("Directory '{}' exists but is not listed in '{}': {}", path, parent, link);
            return Ok(MutationOutcome::Rejected(Rejection::UnableToCreateDirectory));
        }

        info!("Created directory {}", path);
        Ok(MutationOutcome::Applied(Applied::DirectoryCreated))
    }

    /// Ensures the leaf name of `path` is among its parent's children.
    ///
    /// Every round re-reads the parent, so a name added by an earlier partial
    /// attempt or by a concurrent writer is picked up instead of duplicated.
    pub(crate) async fn add_child_to_parent(&self, path: &str) -> Result<LinkOutcome, StoreError> {
        let (parent, name) = split_parent_and_name(path);
        let max_tries = self.retry_limit + 1;

        let outcome = attempt(max_tries, |_| self.try_link(parent, name)).await?;
        Ok(outcome.unwrap_or(LinkOutcome::Exhausted {
            attempts: max_tries,
        }))
    }

    async fn try_link(&self, parent: &str, name: &str) -> Result<Attempt<LinkOutcome>, StoreError> {
        let Some(snapshot) = self.get_metadata(parent).await? else {
            return Ok(Attempt::Done(LinkOutcome::ParentMissing));
        };
        if !snapshot.is_directory {
            return Ok(Attempt::Done(LinkOutcome::ParentNotDirectory));
        }
        if snapshot.has_child(name) {
            return Ok(Attempt::Done(LinkOutcome::AlreadyListed));
        }

        let next = snapshot.with_child(name);
        let swapped = self
            .metadata
            .compare_and_swap(parent, &snapshot, next)
            .await
            .context(CacheAccessSnafu { path: parent })?;
        if swapped {
            Ok(Attempt::Done(LinkOutcome::Linked))
        } else {
            Ok(Attempt::Retry)
        }
    }

    /// Returns whether a file entry is in place at `path` afterwards.
    async fn write_initial_file_entry(&self, path: &str, name: &str) -> Result<bool, StoreError> {
        let initial = Entry::file(name, 0);
        let existing = match self.get_metadata(path).await? {
            None => {
                let stored = self
                    .metadata
                    .put_if_absent(path, initial.clone())
                    .await
                    .context(CacheAccessSnafu { path })?;
                if stored {
                    return Ok(true);
                }
                debug!("Entry of '{}' was written by a concurrent writer first", path);
                self.get_metadata(path).await?
            }
            existing => existing,
        };

        match existing {
            None => Ok(false),
            Some(existing) if existing.is_directory => {
                warn!("A directory entry appeared at '{}' while creating a file", path);
                Ok(false)
            }
            Some(existing) if existing == initial => Ok(true),
            Some(existing) => {
                let replaced = self
                    .metadata
                    .compare_and_swap(path, &existing, initial)
                    .await
                    .context(CacheAccessSnafu { path })?;
                if !replaced {
                    debug!("Stale entry of '{}' was updated concurrently, keeping it", path);
                }
                Ok(true)
            }
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("Failed to access the cache for '{}'", path))]
    CacheAccessError { path: String, source: CacheError },
}

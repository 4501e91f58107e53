use tracing::{debug, info, warn};

use crate::config::SeedNode;
use crate::metadata::{Applied, MetadataStore, MutationOutcome, Rejection, StoreError};
use crate::paths::{ROOT, join_child};
use crate::repository::{Content, Entry, KeyValueCache};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
    pub failed: Vec<(String, Rejection)>,
}

/// Creates `tree` below the root through the regular store mutations.
///
/// Paths that already exist are left alone, so seeding twice is harmless.
/// Children of a directory that could not be created are skipped.
pub async fn seed<M, F>(store: &MetadataStore<M, F>, tree: &SeedNode) -> Result<SeedReport, StoreError>
where
    M: KeyValueCache<Entry>,
    F: KeyValueCache<Content>,
{
    let mut report = SeedReport::default();
    let mut pending = vec![(ROOT.to_string(), tree)];

    while let Some((path, node)) = pending.pop() {
        match node {
            SeedNode::Directory(children) => {
                if path != ROOT && !seed_directory(store, &path, &mut report).await? {
                    continue;
                }
                // reversed so the stack pops them in declaration order
                for (name, child) in children.iter().rev() {
                    pending.push((join_child(&path, name), child));
                }
            }
            SeedNode::File(text) => seed_file(store, &path, text, &mut report).await?,
        }
    }

    info!(
        "Seeding done: {} created, {} already present, {} failed",
        report.created.len(),
        report.existing.len(),
        report.failed.len()
    );
    Ok(report)
}

async fn seed_directory<M, F>(
    store: &MetadataStore<M, F>,
    path: &str,
    report: &mut SeedReport,
) -> Result<bool, StoreError>
where
    M: KeyValueCache<Entry>,
    F: KeyValueCache<Content>,
{
    match store.create_directory(path).await? {
        MutationOutcome::Applied(Applied::DirectoryExists) => {
            debug!("Seed directory {} already exists", path);
            report.existing.push(path.to_string());
            Ok(true)
        }
        MutationOutcome::Applied(_) => {
            report.created.push(path.to_string());
            Ok(true)
        }
        MutationOutcome::Rejected(rejection) => {
            warn!("Could not seed directory {}: {}", path, rejection);
            report.failed.push((path.to_string(), rejection));
            Ok(false)
        }
    }
}

async fn seed_file<M, F>(
    store: &MetadataStore<M, F>,
    path: &str,
    text: &str,
    report: &mut SeedReport,
) -> Result<(), StoreError>
where
    M: KeyValueCache<Entry>,
    F: KeyValueCache<Content>,
{
    match store.create_file(path).await? {
        MutationOutcome::Rejected(Rejection::FileExists) => {
            debug!("Seed file {} already exists", path);
            report.existing.push(path.to_string());
            return Ok(());
        }
        MutationOutcome::Rejected(rejection) => {
            warn!("Could not seed file {}: {}", path, rejection);
            report.failed.push((path.to_string(), rejection));
            return Ok(());
        }
        MutationOutcome::Applied(_) => {}
    }

    if !text.is_empty() {
        let outcome = store
            .save_file(path, &Content::empty(), Content::from(text))
            .await?;
        if let MutationOutcome::Rejected(rejection) = outcome {
            warn!("Created {} but could not fill it: {}", path, rejection);
            report.failed.push((path.to_string(), rejection));
            return Ok(());
        }
    }
    report.created.push(path.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryCache;

    async fn empty_store() -> MetadataStore<MemoryCache<Entry>, MemoryCache<Content>> {
        let store = MetadataStore::new(MemoryCache::new("metadata"), MemoryCache::new("files"));
        store.ensure_root().await.unwrap();
        store
    }

    #[compio::test]
    async fn demo_tree_is_created_in_order() {
        let store = empty_store().await;
        let report = seed(&store, &SeedNode::demo()).await.unwrap();

        assert_eq!(
            report.created,
            vec!["/a", "/a/c", "/a/c/e", "/a/d", "/a/f", "/b", "/c"]
        );
        assert!(report.existing.is_empty());
        assert!(report.failed.is_empty());

        assert_eq!(store.list_directory("/").await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(store.list_directory("/a").await.unwrap(), vec!["c", "d", "f"]);
        assert_eq!(
            store.get_file_contents("/a/d").await.unwrap(),
            Some(Content::from("Contents of /a/d"))
        );
        assert_eq!(store.get_metadata("/b").await.unwrap().map(|e| e.size), Some(14));
    }

    #[compio::test]
    async fn seeding_twice_changes_nothing() {
        let store = empty_store().await;
        seed(&store, &SeedNode::demo()).await.unwrap();
        let report = seed(&store, &SeedNode::demo()).await.unwrap();

        assert!(report.created.is_empty());
        assert_eq!(report.existing.len(), 7);
        assert_eq!(store.list_directory("/").await.unwrap(), vec!["a", "b", "c"]);
    }

    #[compio::test]
    async fn children_of_failed_directory_are_skipped() {
        let store = empty_store().await;
        store.create_file("/a").await.unwrap();

        let tree = SeedNode::Directory(vec![(
            "a".to_string(),
            SeedNode::Directory(vec![("inner".to_string(), SeedNode::File(String::new()))]),
        )]);
        let report = seed(&store, &tree).await.unwrap();

        assert_eq!(report.failed, vec![("/a".to_string(), Rejection::FileExists)]);
        assert!(report.created.is_empty());
        assert_eq!(store.get_metadata("/a/inner").await.unwrap(), None);
    }
}

use snafu::Snafu;
use snafu::prelude::*;
use tracing::debug;
use tracing::info;

use crate::application::RuntimeConfig;
use crate::cli::Command;
use crate::config::{SeedNode, StoreConfig, StoreConfigError};
use crate::contention::{ContentionDriver, ContentionError, ContentionPlan};
use crate::filesystem::{TreeNode, seed};
use crate::metadata::{MetadataStore, MutationOutcome, Rejection, StoreError};
use crate::paths::is_well_formed;
use crate::repository::{Content, Entry, MemoryCache, Snapshot, SnapshotError};

type LocalStore = MetadataStore<MemoryCache<Entry>, MemoryCache<Content>>;

/// How a command left the store.
#[derive(Debug)]
enum Completion {
    ReadOnly,
    Mutated,
    Rejected { path: String, rejection: Rejection },
}

impl Completion {
    fn from_outcome(path: &str, outcome: MutationOutcome) -> Self {
        match outcome {
            MutationOutcome::Applied(_) => {
                println!("{path}: {}", outcome.message());
                Completion::Mutated
            }
            MutationOutcome::Rejected(rejection) => Completion::Rejected {
                path: path.to_string(),
                rejection,
            },
        }
    }
}

pub struct Application;

impl Application {
    pub async fn run(app_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let app_config: RuntimeConfig = app_config.into();
        if let Some(path) = app_config.command.path() {
            ensure!(is_well_formed(path), MalformedPathSnafu { path });
        }

        let config = StoreConfig::read(&app_config.root)
            .await
            .context(ConfigSnafu)?;
        debug!("Loaded config: {:?}", config);

        let snapshot_path = app_config.root.join(&config.snapshot);
        let (metadata, files) = Snapshot::read(&snapshot_path)
            .await
            .context(PersistenceSnafu)?
            .into_caches();
        let store = MetadataStore::new(metadata.clone(), files.clone())
            .with_retry_limit(config.retry_limit);
        let root_created = store.ensure_root().await.context(CacheSnafu)?;

        let completion =
            Self::execute(&store, (&metadata, &files), &config, app_config.command).await?;

        if root_created || !matches!(completion, Completion::ReadOnly) {
            info!("Persisting store to {}", snapshot_path.display());
            Snapshot::capture(&metadata, &files)
                .await
                .write(&snapshot_path)
                .await
                .context(PersistenceSnafu)?;
        }

        match completion {
            Completion::Rejected { path, rejection } => {
                Err(ApplicationError::MutationRejected { path, rejection })
            }
            Completion::ReadOnly | Completion::Mutated => Ok(()),
        }
    }

    async fn execute(
        store: &LocalStore,
        (metadata, files): (&MemoryCache<Entry>, &MemoryCache<Content>),
        config: &StoreConfig,
        command: Command,
    ) -> Result<Completion, ApplicationError> {
        match command {
            Command::Ls { path } => {
                let node = TreeNode::load(store, &path, Some(1)).await.context(CacheSnafu)?;
                println!("{}", node.render_listing());
                Ok(Completion::ReadOnly)
            }
            Command::Tree { path } => {
                let node = TreeNode::load(store, &path, None).await.context(CacheSnafu)?;
                println!("{}", node.render_tree());
                Ok(Completion::ReadOnly)
            }
            Command::Stat { path } => {
                let entry = store
                    .get_metadata(&path)
                    .await
                    .context(CacheSnafu)?
                    .context(NotFoundSnafu { path: path.clone() })?;
                println!("{}", describe(&path, &entry));
                Ok(Completion::ReadOnly)
            }
            Command::Cat { path } => {
                let contents = store
                    .get_file_contents(&path)
                    .await
                    .context(CacheSnafu)?
                    .context(NotFoundSnafu { path: path.clone() })?;
                println!("{contents}");
                Ok(Completion::ReadOnly)
            }
            Command::Touch { path } => {
                let outcome = store.create_file(&path).await.context(CacheSnafu)?;
                Ok(Completion::from_outcome(&path, outcome))
            }
            Command::Mkdir { path } => {
                let outcome = store.create_directory(&path).await.context(CacheSnafu)?;
                Ok(Completion::from_outcome(&path, outcome))
            }
            Command::Write {
                path,
                contents,
                expected,
            } => {
                let expected = match expected {
                    Some(expected) => Content::from(expected),
                    None => store
                        .get_file_contents(&path)
                        .await
                        .context(CacheSnafu)?
                        .context(NotFoundSnafu { path: path.clone() })?,
                };
                let outcome = store
                    .save_file(&path, &expected, Content::from(contents))
                    .await
                    .context(CacheSnafu)?;
                Ok(Completion::from_outcome(&path, outcome))
            }
            Command::Seed => {
                let tree = config.seed.clone().unwrap_or_else(SeedNode::demo);
                let report = seed(store, &tree).await.context(CacheSnafu)?;
                println!(
                    "{} created, {} already present, {} failed",
                    report.created.len(),
                    report.existing.len(),
                    report.failed.len()
                );
                for (path, rejection) in &report.failed {
                    println!("  {path}: {rejection}");
                }
                Ok(Completion::Mutated)
            }
            Command::Contend {
                directory,
                clients,
                files: files_per_client,
            } => {
                let driver = ContentionDriver::new(metadata.clone(), files.clone(), config.retry_limit)
                    .context(ContentionRunSnafu)?;
                let plan = ContentionPlan {
                    directory,
                    clients,
                    files_per_client,
                };
                let report = driver.run(&plan).await.context(ContentionRunSnafu)?;
                println!(
                    "{} created, {} rejected, {} missing from the listing",
                    report.created.len(),
                    report.rejected.len(),
                    report.unlisted.len()
                );
                for (path, rejection) in &report.rejected {
                    println!("  {path}: {rejection}");
                }
                ensure!(
                    report.converged(),
                    ContentionDivergedSnafu {
                        unlisted: report.unlisted
                    }
                );
                Ok(Completion::Mutated)
            }
        }
    }
}

fn describe(path: &str, entry: &Entry) -> String {
    let kind = if entry.is_directory { "directory" } else { "file" };
    let mut lines = vec![
        format!("path: {path}"),
        format!("name: {}", entry.name),
        format!("type: {kind}"),
    ];
    if entry.is_directory {
        lines.push(format!("children: {}", entry.children.len()));
    } else {
        lines.push(format!("size: {}", entry.size));
    }
    lines.join("\n")
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("'{}' is not a well-formed absolute path", path))]
    MalformedPath { path: String },
    #[snafu(display("Critical failure encountered during configuration stage"))]
    ConfigError { source: StoreConfigError },
    #[snafu(display("Failed to load or persist the store"))]
    PersistenceError { source: SnapshotError },
    #[snafu(display("Failed to talk to the cache"))]
    CacheError { source: StoreError },
    #[snafu(display("Contention run failed"))]
    ContentionRunError { source: ContentionError },
    #[snafu(display("{}: not found", path))]
    NotFound { path: String },
    #[snafu(display("{}: {}", path, rejection))]
    MutationRejected { path: String, rejection: Rejection },
    #[snafu(display("{} created files are missing from the listing: {:?}", unlisted.len(), unlisted))]
    ContentionDiverged { unlisted: Vec<String> },
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::repository::KeyValueCache;
    use tempfile::TempDir;

    fn config(root: &Path, command: Command) -> RuntimeConfig {
        RuntimeConfig {
            command,
            root: root.to_path_buf(),
        }
    }

    fn touch(path: &str) -> Command {
        Command::Touch {
            path: path.to_string(),
        }
    }

    async fn stored(root: &Path) -> (MemoryCache<Entry>, MemoryCache<Content>) {
        Snapshot::read(&root.join(".cachefs/store.bin"))
            .await
            .unwrap()
            .into_caches()
    }

    #[compio::test]
    async fn mutations_persist_between_runs() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        Application::run(config(dir.path(), touch("/notes")))
            .await
            .unwrap();
        Application::run(config(
            dir.path(),
            Command::Write {
                path: "/notes".to_string(),
                contents: "hello".to_string(),
                expected: Some(String::new()),
            },
        ))
        .await
        .unwrap();

        let (metadata, files) = stored(dir.path()).await;
        assert_eq!(
            metadata.get("/").await.unwrap().unwrap().children,
            vec!["notes"]
        );
        assert_eq!(metadata.get("/notes").await.unwrap().unwrap().size, 5);
        assert_eq!(
            files.get("/notes").await.unwrap(),
            Some(Content::from("hello"))
        );
    }

    #[compio::test]
    async fn duplicate_file_is_rejected() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        Application::run(config(dir.path(), touch("/notes")))
            .await
            .unwrap();

        let result = Application::run(config(dir.path(), touch("/notes"))).await;
        assert!(matches!(
            result,
            Err(ApplicationError::MutationRejected {
                rejection: Rejection::FileExists,
                ..
            })
        ));
    }

    #[compio::test]
    async fn stale_write_is_rejected_and_keeps_contents() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        Application::run(config(dir.path(), touch("/notes")))
            .await
            .unwrap();
        let write = |contents: &str, expected: &str| Command::Write {
            path: "/notes".to_string(),
            contents: contents.to_string(),
            expected: Some(expected.to_string()),
        };
        Application::run(config(dir.path(), write("first", "")))
            .await
            .unwrap();

        let result = Application::run(config(dir.path(), write("second", ""))).await;
        assert!(matches!(
            result,
            Err(ApplicationError::MutationRejected {
                rejection: Rejection::RemoteChanged,
                ..
            })
        ));
        let (_, files) = stored(dir.path()).await;
        assert_eq!(
            files.get("/notes").await.unwrap(),
            Some(Content::from("first"))
        );
    }

    #[compio::test]
    async fn malformed_path_is_refused_before_touching_the_store() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let result = Application::run(config(dir.path(), touch("relative/path"))).await;

        assert!(matches!(result, Err(ApplicationError::MalformedPath { .. })));
        assert!(!dir.path().join(".cachefs").exists());
    }

    #[compio::test]
    async fn missing_file_is_not_found() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let result = Application::run(config(
            dir.path(),
            Command::Cat {
                path: "/nope".to_string(),
            },
        ))
        .await;

        assert!(matches!(result, Err(ApplicationError::NotFound { path }) if path == "/nope"));
    }

    #[compio::test]
    async fn seed_uses_configured_tree_and_snapshot_path() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::write(
            dir.path().join("cachefs.yaml"),
            "snapshot: state.bin\nseed:\n  docs:\n    readme: \"hi\"\n",
        )
        .expect("Failed to write config");

        Application::run(config(dir.path(), Command::Seed))
            .await
            .unwrap();

        let snapshot = PathBuf::from(dir.path()).join("state.bin");
        let (metadata, files) = Snapshot::read(&snapshot).await.unwrap().into_caches();
        assert_eq!(metadata.get("/").await.unwrap().unwrap().children, vec!["docs"]);
        assert_eq!(
            files.get("/docs/readme").await.unwrap(),
            Some(Content::from("hi"))
        );
    }

    #[compio::test]
    async fn read_only_command_still_persists_a_fresh_root() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        Application::run(config(
            dir.path(),
            Command::Ls {
                path: "/".to_string(),
            },
        ))
        .await
        .unwrap();

        let (metadata, _) = stored(dir.path()).await;
        assert_eq!(
            metadata.get("/").await.unwrap(),
            Some(Entry::directory("/"))
        );
    }

    #[compio::test]
    async fn contention_run_converges() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::write(dir.path().join("cachefs.yaml"), "retry_limit: 1000\n")
            .expect("Failed to write config");
        Application::run(config(
            dir.path(),
            Command::Contend {
                directory: "/race".to_string(),
                clients: 3,
                files: 4,
            },
        ))
        .await
        .unwrap();

        let (metadata, _) = stored(dir.path()).await;
        assert_eq!(metadata.get("/race").await.unwrap().unwrap().children.len(), 12);
    }
}

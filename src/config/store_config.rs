use std::borrow::Cow;
use std::path::{Path, PathBuf};

use compio::fs;
use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use tracing::{debug, info};

use crate::config::SeedNode;
use crate::metadata::RETRY_LIMIT;

const CONFIG_FILE_NAME: &str = "cachefs.yaml";
const DEFAULT_SNAPSHOT_PATH: &str = ".cachefs/store.bin";

fn get_config_file_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

fn key<'a>(name: &'static str) -> Yaml<'a> {
    Yaml::Value(Scalar::String(Cow::Borrowed(name)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Where the caches are persisted, relative to the project root.
    pub snapshot: PathBuf,
    pub retry_limit: usize,
    pub seed: Option<SeedNode>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            retry_limit: RETRY_LIMIT,
            seed: None,
        }
    }
}

impl StoreConfig {
    /// Reads `cachefs.yaml` under `root`, falling back to defaults when there is none.
    pub async fn read(root: &Path) -> Result<Self, StoreConfigError> {
        let path = get_config_file_path(root);
        if !path.exists() {
            info!("No {} found, using defaults", CONFIG_FILE_NAME);
            return Ok(Self::default());
        }
        Self::from_path(path).await
    }

    pub async fn from_path(path: PathBuf) -> Result<Self, StoreConfigError> {
        debug!("Reading config file: {}", path.display());
        let bytes = fs::read(&path).await.context(ReadSnafu {
            file_path: path.display().to_string(),
        })?;
        let contents = String::from_utf8(bytes).context(EncodingSnafu {
            file_path: path.display().to_string(),
        })?;
        contents.as_str().try_into()
    }

    fn parse_retry_limit(top_level: &LinkedHashMap<Yaml, Yaml>) -> Result<usize, StoreConfigError> {
        match top_level.get(&key("retry_limit")) {
            None => Ok(RETRY_LIMIT),
            Some(Yaml::Value(Scalar::Integer(limit))) => {
                usize::try_from(*limit).map_err(|_| StoreConfigError::RetryLimitNotInteger)
            }
            Some(_) => Err(StoreConfigError::RetryLimitNotInteger),
        }
    }

    fn parse_snapshot(top_level: &LinkedHashMap<Yaml, Yaml>) -> Result<PathBuf, StoreConfigError> {
        match top_level.get(&key("snapshot")) {
            None => Ok(PathBuf::from(DEFAULT_SNAPSHOT_PATH)),
            Some(value) => value
                .as_str()
                .filter(|path| !path.is_empty())
                .map(PathBuf::from)
                .ok_or(StoreConfigError::SnapshotNotString),
        }
    }

    fn parse_seed(top_level: &LinkedHashMap<Yaml, Yaml>) -> Result<Option<SeedNode>, StoreConfigError> {
        match top_level.get(&key("seed")) {
            None => Ok(None),
            Some(value) => value
                .as_mapping()
                .map(|mapping| Some(SeedNode::from_yaml_mapping(mapping)))
                .ok_or(StoreConfigError::SeedNotMap),
        }
    }
}

impl TryFrom<&str> for StoreConfig {
    type Error = StoreConfigError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let contents_vec = Yaml::load_from_str(contents)
            .map_err(|e| StoreConfigError::ParseError { source: e })?;
        let contents = contents_vec
            .first()
            .ok_or(StoreConfigError::MalformedConfig)?;

        let top_level = contents
            .as_mapping()
            .ok_or(StoreConfigError::TopLevelNotMap)?;

        Ok(StoreConfig {
            snapshot: Self::parse_snapshot(top_level)?,
            retry_limit: Self::parse_retry_limit(top_level)?,
            seed: Self::parse_seed(top_level)?,
        })
    }
}

#[derive(Debug, Snafu)]
pub enum StoreConfigError {
    #[snafu(display("Failed to read the config file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Config file is not valid UTF-8: {}", file_path))]
    EncodingError {
        file_path: String,
        source: std::string::FromUtf8Error,
    },
    #[snafu(display("Failed to parse the config file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Improperly formatted config file"))]
    MalformedConfig,
    #[snafu(display("Top level of config should be a map"))]
    TopLevelNotMap,
    #[snafu(display("'snapshot' should be a non-empty path"))]
    SnapshotNotString,
    #[snafu(display("'retry_limit' should be a non-negative integer"))]
    RetryLimitNotInteger,
    #[snafu(display("'seed' section should be a map"))]
    SeedNotMap,
}

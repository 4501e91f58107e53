use std::hash::Hasher;
use std::path::{Path, PathBuf};

use bincode::{Decode, Encode};
use compio::{BufResult, fs};
use metrohash::MetroHash64;
use snafu::{ResultExt, Snafu, ensure};
use tracing::{debug, info};

use super::{Content, Entry, MemoryCache};

const MAGIC: &[u8; 4] = b"CFS1";
const HEADER_LEN: usize = MAGIC.len() + size_of::<u64>();
const COMPRESSION_LEVEL: i32 = 3;

pub const METADATA_CACHE: &str = "metadata";
pub const FILES_CACHE: &str = "files";

/// Both key spaces of a store, persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct Snapshot {
    entries: Vec<(String, Entry)>,
    contents: Vec<(String, Content)>,
}

impl Snapshot {
    pub async fn capture(metadata: &MemoryCache<Entry>, files: &MemoryCache<Content>) -> Self {
        let snapshot = Self {
            entries: metadata.pairs().await,
            contents: files.pairs().await,
        };
        debug!(
            "Captured {} pairs from '{}' and {} from '{}'",
            snapshot.entries.len(),
            metadata.name(),
            snapshot.contents.len(),
            files.name()
        );
        snapshot
    }

    pub fn into_caches(self) -> (MemoryCache<Entry>, MemoryCache<Content>) {
        (
            MemoryCache::from_pairs(METADATA_CACHE, self.entries),
            MemoryCache::from_pairs(FILES_CACHE, self.contents),
        )
    }

    /// Loads a snapshot, or an empty one when the file does not exist yet.
    pub async fn read(path: &Path) -> Result<Self, SnapshotError> {
        debug!("Reading snapshot from {}", path.display());
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("No existing snapshot found, starting fresh");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).context(ReadSnafu {
                    path: path.to_path_buf(),
                });
            }
        };
        let snapshot = Self::decode(&bytes)?;
        debug!(
            "Loaded {} entries and {} file contents",
            snapshot.entries.len(),
            snapshot.contents.len()
        );
        Ok(snapshot)
    }

    /// Writes to a temporary sibling first, then renames over `path`.
    pub async fn write(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.context(WriteSnafu {
                path: parent.to_path_buf(),
            })?;
        }

        let bytes = self.encode()?;
        let temporary = temporary_path(path);
        let BufResult(result, _) = fs::write(&temporary, bytes).await;
        result.context(WriteSnafu {
            path: temporary.clone(),
        })?;
        fs::rename(&temporary, path).await.context(WriteSnafu {
            path: path.to_path_buf(),
        })?;

        debug!("Snapshot written to {}", path.display());
        Ok(())
    }

    fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        let payload =
            bincode::encode_to_vec(self, bincode::config::standard()).context(EncodeSnafu)?;
        let compressed = zstd::encode_all(payload.as_slice(), COMPRESSION_LEVEL).context(CompressSnafu)?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + compressed.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&checksum(&payload).to_le_bytes());
        bytes.extend_from_slice(&compressed);
        Ok(bytes)
    }

    fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        ensure!(
            bytes.len() >= HEADER_LEN && &bytes[..MAGIC.len()] == MAGIC,
            BadMagicSnafu
        );
        let mut stored = [0u8; size_of::<u64>()];
        stored.copy_from_slice(&bytes[MAGIC.len()..HEADER_LEN]);
        let expected = u64::from_le_bytes(stored);

        let payload = zstd::decode_all(&bytes[HEADER_LEN..]).context(CompressSnafu)?;
        let actual = checksum(&payload);
        ensure!(actual == expected, ChecksumMismatchSnafu { expected, actual });

        let (snapshot, _) = bincode::decode_from_slice(&payload, bincode::config::standard())
            .context(DecodeSnafu)?;
        Ok(snapshot)
    }
}

fn checksum(payload: &[u8]) -> u64 {
    let mut hasher = MetroHash64::default();
    hasher.write(payload);
    hasher.finish()
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[derive(Debug, Snafu)]
pub enum SnapshotError {
    #[snafu(display("Failed to read the snapshot file: {}", path.display()))]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to write the snapshot file: {}", path.display()))]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Snapshot file does not start with the expected header"))]
    BadMagic,
    #[snafu(display("Snapshot checksum mismatch: expected {:016x}, got {:016x}", expected, actual))]
    ChecksumMismatch { expected: u64, actual: u64 },
    #[snafu(display("Failed to (de)compress the snapshot"))]
    CompressError { source: std::io::Error },
    #[snafu(display("Failed to encode the snapshot"))]
    EncodeError { source: bincode::error::EncodeError },
    #[snafu(display("Failed to decode the snapshot"))]
    DecodeError { source: bincode::error::DecodeError },
}

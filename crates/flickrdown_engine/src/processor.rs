use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flickrdown_logging::{flickrdown_debug, flickrdown_warn};

use crate::persist::write_atomic;
use crate::{DestinationResolver, ItemId, RemoteError, RemoteItem, Transfer, TransferError};

const DEFAULT_EXTENSION: &str = "jpg";

/// Performs the work for a single item. Implementations may retry internally;
/// the runner only sees the settled outcome.
#[async_trait::async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(&self, item: RemoteItem) -> Result<ProcessedItem, ProcessError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedItem {
    pub id: ItemId,
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to get metadata: {0}")]
    Metadata(#[from] RemoteError),
    #[error("failed to prepare destination {path:?}: {message}")]
    Destination { path: PathBuf, message: String },
    #[error("no original download url for {title:?}")]
    MissingOriginal { title: String },
    #[error("failed to parse source url {url:?}: {message}")]
    SourceUrl { url: String, message: String },
    #[error("failed to serialize metadata: {0}")]
    Serialize(String),
    #[error("failed to write {path:?}: {message}")]
    Persist { path: PathBuf, message: String },
    #[error("failed to download file: {0}")]
    Transfer(#[from] TransferError),
    #[error("item task panicked")]
    Panicked,
    #[error("{0}")]
    Other(String),
}

/// Archives one item: metadata sidecar first, then the original bytes.
#[derive(Clone)]
pub struct ArchiveProcessor {
    resolver: Arc<dyn DestinationResolver>,
    transfer: Arc<dyn Transfer>,
}

impl ArchiveProcessor {
    pub fn new(resolver: Arc<dyn DestinationResolver>, transfer: Arc<dyn Transfer>) -> Self {
        Self { resolver, transfer }
    }
}

#[async_trait::async_trait]
impl ItemProcessor for ArchiveProcessor {
    async fn process(&self, mut item: RemoteItem) -> Result<ProcessedItem, ProcessError> {
        flickrdown_debug!("Processing item {}", item.id());
        let meta = item.metadata().await?;

        let stem = self.resolver.resolve(meta);
        let meta_path = with_suffix(&stem, "meta");
        let json = serde_json::to_vec_pretty(meta)
            .map_err(|err| ProcessError::Serialize(err.to_string()))?;
        flickrdown_debug!("Writing metadata for {} to {:?}", meta.title, meta_path);
        write_sidecar(meta_path, json).await?;

        let original = meta.original().ok_or_else(|| ProcessError::MissingOriginal {
            title: meta.title.clone(),
        })?;
        let extension = extension_from_url(&original.source)?;
        let target = with_suffix(&stem, &extension);

        flickrdown_debug!("Writing file for {} to {:?}", meta.title, target);
        let bytes = self.transfer.transfer(&original.source, &target).await?;

        Ok(ProcessedItem {
            id: item.id().clone(),
            path: target,
            bytes,
        })
    }
}

/// Creates the destination directory and writes the `.meta` file on the
/// blocking pool.
async fn write_sidecar(meta_path: PathBuf, json: Vec<u8>) -> Result<(), ProcessError> {
    tokio::task::spawn_blocking(move || {
        if let Some(dir) = meta_path.parent() {
            fs::create_dir_all(dir).map_err(|err| ProcessError::Destination {
                path: dir.to_path_buf(),
                message: err.to_string(),
            })?;
        }
        write_atomic(&meta_path, &json).map_err(|err| ProcessError::Persist {
            path: meta_path.clone(),
            message: err.to_string(),
        })?;
        Ok(())
    })
    .await
    .map_err(|err| ProcessError::Other(format!("metadata write task failed: {err}")))?
}

/// File extension of the last path segment of `source`, defaulting to `jpg`.
pub fn extension_from_url(source: &str) -> Result<String, ProcessError> {
    let url = url::Url::parse(source).map_err(|err| ProcessError::SourceUrl {
        url: source.to_string(),
        message: err.to_string(),
    })?;
    let extension = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => Ok(ext.to_ascii_lowercase()),
        None => {
            flickrdown_warn!(
                "Failed to detect file extension from url, defaulting to '{}': {}",
                DEFAULT_EXTENSION,
                source
            );
            Ok(DEFAULT_EXTENSION.to_string())
        }
    }
}

/// Appends `.{suffix}` without replacing dots already in the stem.
fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(stem.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

use std::fmt;
use std::sync::Arc;

use crate::{ItemId, ItemMeta, RemoteError};

/// Looks up the metadata of a single item.
#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_metadata(&self, id: &ItemId) -> Result<ItemMeta, RemoteError>;
}

/// One item yielded by a catalog.
///
/// Metadata is fetched on first use and kept for the lifetime of this value.
/// An item is owned by the single task processing it, so the cache needs no
/// synchronization.
pub struct RemoteItem {
    id: ItemId,
    source: Option<Arc<dyn MetadataSource>>,
    meta: Option<ItemMeta>,
}

impl RemoteItem {
    pub fn new(id: ItemId, source: Arc<dyn MetadataSource>) -> Self {
        Self {
            id,
            source: Some(source),
            meta: None,
        }
    }

    /// An item whose metadata is already known.
    pub fn prefetched(meta: ItemMeta) -> Self {
        Self {
            id: meta.id.clone(),
            source: None,
            meta: Some(meta),
        }
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn is_fetched(&self) -> bool {
        self.meta.is_some()
    }

    pub async fn metadata(&mut self) -> Result<&ItemMeta, RemoteError> {
        let meta = match self.meta.take() {
            Some(meta) => meta,
            None => {
                let source = self.source.as_ref().ok_or_else(|| RemoteError::Decode {
                    method: "metadata".to_string(),
                    message: format!("no metadata source for item {}", self.id),
                })?;
                source.fetch_metadata(&self.id).await?
            }
        };
        Ok(self.meta.insert(meta))
    }
}

impl fmt::Debug for RemoteItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteItem")
            .field("id", &self.id)
            .field("fetched", &self.meta.is_some())
            .finish()
    }
}

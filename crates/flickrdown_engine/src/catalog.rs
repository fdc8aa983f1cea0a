use std::sync::Arc;

use flickrdown_logging::flickrdown_debug;

use crate::{ItemId, MetadataSource, RemoteError, RemoteItem, Window};

/// Pull-based view over the remote items in one window.
#[async_trait::async_trait]
pub trait RemoteCatalog: Send {
    /// Returns the next unseen item, or `Ok(None)` once the catalog is exhausted.
    async fn next_item(&mut self) -> Result<Option<RemoteItem>, RemoteError>;
}

/// Opens a fresh catalog per pass.
pub trait CatalogSource: Send + Sync {
    fn open(&self, window: Window) -> Box<dyn RemoteCatalog>;
}

/// One server page of search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub total_pages: u32,
    pub items: Vec<ItemId>,
}

#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches 1-based page `page` of the items in `window`.
    async fn fetch_page(&self, window: &Window, page: u32) -> Result<Page, RemoteError>;
}

/// Catalog that walks server pages transparently, holding one page at a time.
pub struct PagedCatalog {
    fetcher: Arc<dyn PageFetcher>,
    metadata: Arc<dyn MetadataSource>,
    window: Window,
    page: Option<Page>,
    requested: u32,
    cursor: usize,
}

impl PagedCatalog {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        metadata: Arc<dyn MetadataSource>,
        window: Window,
    ) -> Self {
        Self {
            fetcher,
            metadata,
            window,
            page: None,
            requested: 0,
            cursor: 0,
        }
    }

    async fn load(&mut self, number: u32) -> Result<(), RemoteError> {
        let page = self.fetcher.fetch_page(&self.window, number).await?;
        flickrdown_debug!(
            "{} results on page {} of {} for {}",
            page.items.len(),
            number,
            page.total_pages,
            self.window
        );
        self.requested = number;
        self.cursor = 0;
        self.page = Some(page);
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteCatalog for PagedCatalog {
    async fn next_item(&mut self) -> Result<Option<RemoteItem>, RemoteError> {
        if self.page.is_none() {
            flickrdown_debug!("Searching for items in {}", self.window);
            self.load(1).await?;
        }

        loop {
            let Some(page) = self.page.as_ref() else {
                return Ok(None);
            };
            if let Some(id) = page.items.get(self.cursor) {
                let id = id.clone();
                self.cursor += 1;
                return Ok(Some(RemoteItem::new(id, Arc::clone(&self.metadata))));
            }
            // Track the page we asked for: servers answer out-of-range requests
            // with the last page, which would otherwise loop forever.
            if self.requested >= page.total_pages {
                return Ok(None);
            }
            let next = self.requested + 1;
            self.load(next).await?;
        }
    }
}

/// Opens a `PagedCatalog` over a shared fetcher for each window.
#[derive(Clone)]
pub struct PagedCatalogSource {
    fetcher: Arc<dyn PageFetcher>,
    metadata: Arc<dyn MetadataSource>,
}

impl PagedCatalogSource {
    pub fn new(fetcher: Arc<dyn PageFetcher>, metadata: Arc<dyn MetadataSource>) -> Self {
        Self { fetcher, metadata }
    }
}

impl CatalogSource for PagedCatalogSource {
    fn open(&self, window: Window) -> Box<dyn RemoteCatalog> {
        Box::new(PagedCatalog::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.metadata),
            window,
        ))
    }
}

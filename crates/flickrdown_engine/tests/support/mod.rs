#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use chrono::NaiveDate;
use flickrdown_engine::{
    BatchRunner, CatalogSource, ItemId, ItemMeta, ItemProcessor, MetadataSource, Page,
    PageFetcher, PagedCatalogSource, ProcessError, ProcessedItem, RemoteCatalog, RemoteError,
    RemoteItem, SizeVariant, Window,
};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(flickrdown_logging::initialize_for_tests);
}

pub fn day() -> Window {
    Window::day(NaiveDate::from_ymd_opt(2016, 3, 1).unwrap())
}

pub fn meta(id: &str, title: &str) -> ItemMeta {
    ItemMeta {
        id: ItemId::new(id),
        title: title.to_string(),
        description: String::new(),
        taken: NaiveDate::from_ymd_opt(2016, 3, 1)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap(),
        collections: Vec::new(),
        sizes: vec![SizeVariant {
            label: "Original".to_string(),
            width: 4000,
            height: 3000,
            source: format!("https://live.example.com/{id}_o.jpg"),
        }],
    }
}

/// Serves fixed pages; a `None` page fails with a network error.
pub struct ScriptedPages {
    pages: Vec<Option<Vec<&'static str>>>,
    pub requests: Mutex<Vec<(Window, u32)>>,
}

impl ScriptedPages {
    pub fn new(pages: Vec<Option<Vec<&'static str>>>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl PageFetcher for ScriptedPages {
    async fn fetch_page(&self, window: &Window, page: u32) -> Result<Page, RemoteError> {
        self.requests.lock().unwrap().push((*window, page));
        let index = page as usize - 1;
        match self.pages.get(index) {
            Some(Some(ids)) => Ok(Page {
                number: page,
                total_pages: self.pages.len() as u32,
                items: ids.iter().map(|id| ItemId::new(*id)).collect(),
            }),
            Some(None) => Err(RemoteError::Network(format!("page {page} unavailable"))),
            None => Err(RemoteError::Api {
                code: 1,
                message: format!("no page {page}"),
            }),
        }
    }
}

#[derive(Default)]
pub struct StaticMetadata {
    pub fetches: AtomicUsize,
}

#[async_trait::async_trait]
impl MetadataSource for StaticMetadata {
    async fn fetch_metadata(&self, id: &ItemId) -> Result<ItemMeta, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(meta(id.as_str(), &format!("title {id}")))
    }
}

/// Catalog source that counts how often a catalog is opened.
pub struct CountingSource {
    inner: PagedCatalogSource,
    pub opened: AtomicUsize,
}

impl CountingSource {
    pub fn new(pages: Arc<ScriptedPages>) -> Arc<Self> {
        Arc::new(Self {
            inner: PagedCatalogSource::new(pages, Arc::new(StaticMetadata::default())),
            opened: AtomicUsize::new(0),
        })
    }
}

impl CatalogSource for CountingSource {
    fn open(&self, window: Window) -> Box<dyn RemoteCatalog> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.inner.open(window)
    }
}

/// Records every processed id; fails or panics on request.
#[derive(Default)]
pub struct RecordingProcessor {
    pub seen: Mutex<Vec<ItemId>>,
    pub fail: HashSet<String>,
    pub panic_on: HashSet<String>,
    pub delay: Option<Duration>,
    pub finished: AtomicUsize,
}

impl RecordingProcessor {
    pub fn failing(ids: &[&str]) -> Self {
        Self {
            fail: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn seen_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for id in self.seen.lock().unwrap().iter() {
            *counts.entry(id.to_string()).or_insert(0) += 1;
        }
        counts
    }
}

#[async_trait::async_trait]
impl ItemProcessor for RecordingProcessor {
    async fn process(&self, mut item: RemoteItem) -> Result<ProcessedItem, ProcessError> {
        let id = item.id().clone();
        self.seen.lock().unwrap().push(id.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_on.contains(id.as_str()) {
            panic!("processor blew up on {id}");
        }
        let title = item.metadata().await?.title.clone();
        self.finished.fetch_add(1, Ordering::SeqCst);
        if self.fail.contains(id.as_str()) {
            return Err(ProcessError::Other(format!("refused {title}")));
        }
        Ok(ProcessedItem {
            id,
            path: title.into(),
            bytes: 1,
        })
    }
}

pub fn runner(source: Arc<CountingSource>, processor: Arc<RecordingProcessor>) -> BatchRunner {
    BatchRunner::new(source, processor)
}

//! Flickrdown engine: remote catalog paging, per-item fan-out and pass scheduling.
mod catalog;
mod coalescer;
mod flickr;
mod item;
mod layout;
mod orchestrator;
mod persist;
mod processor;
mod runner;
mod transfer;
mod types;

pub use catalog::{CatalogSource, Page, PageFetcher, PagedCatalog, PagedCatalogSource, RemoteCatalog};
pub use coalescer::{subscribe, BeginEvents, CoalescerHandle};
pub use flickr::{FlickrClient, FlickrSettings, DEFAULT_ENDPOINT, FLICKR_DATE_FORMAT};
pub use item::{MetadataSource, RemoteItem};
pub use layout::{sanitize_component, ArchiveLayout, DestinationResolver};
pub use orchestrator::{Orchestrator, OrchestratorStats, WindowPlanner};
pub use persist::{ensure_output_dir, write_atomic, AtomicFileWriter, PersistError, StagedFile};
pub use processor::{extension_from_url, ArchiveProcessor, ItemProcessor, ProcessError, ProcessedItem};
pub use runner::{BatchRunner, ItemFailure, PassError, PassResult};
pub use transfer::{FailureKind, ReqwestTransfer, Transfer, TransferError, TransferSettings};
pub use types::{ItemId, ItemMeta, RemoteError, SizeVariant, Window, WindowError, ORIGINAL_LABEL};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use flickrdown_logging::{flickrdown_debug, flickrdown_error, flickrdown_info, flickrdown_warn};
use futures_util::FutureExt;
use tokio::sync::mpsc;

use crate::{
    CatalogSource, ItemId, ItemProcessor, ProcessError, ProcessedItem, RemoteError, RemoteItem,
    Window, WindowError,
};

type ItemOutcome = (ItemId, Result<ProcessedItem, ProcessError>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub id: ItemId,
    pub error: ProcessError,
}

/// Aggregate of one pass. Failure order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassResult {
    pub succeeded: usize,
    pub failures: Vec<ItemFailure>,
}

impl PassResult {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Summarizes item failures as a single pass-level error.
    pub fn ensure_success(&self) -> Result<(), PassError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(PassError::ItemFailures {
                failed: self.failed(),
                total: self.total(),
            })
        }
    }

    /// Folds a later pass into this one.
    pub fn merge(&mut self, other: PassResult) {
        self.succeeded += other.succeeded;
        self.failures.extend(other.failures);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PassError {
    #[error("invalid window: {0}")]
    InvalidWindow(#[from] WindowError),
    #[error("pass aborted, catalog failed: {0}")]
    Aborted(#[source] RemoteError),
    #[error("{failed} of {total} items failed, see logs")]
    ItemFailures { failed: usize, total: usize },
}

/// Runs one pass at a time: pulls every item in a window and processes them concurrently.
#[derive(Clone)]
pub struct BatchRunner {
    catalogs: Arc<dyn CatalogSource>,
    processor: Arc<dyn ItemProcessor>,
}

impl BatchRunner {
    pub fn new(catalogs: Arc<dyn CatalogSource>, processor: Arc<dyn ItemProcessor>) -> Self {
        Self {
            catalogs,
            processor,
        }
    }

    /// Runs a pass over `window`.
    ///
    /// Returns only after every dispatched item has settled, including when the
    /// catalog fails part way. A catalog failure stops paging and becomes
    /// `PassError::Aborted`; item failures are collected into the result.
    pub async fn run_pass(&self, window: Window) -> Result<PassResult, PassError> {
        window.validate()?;
        flickrdown_info!("Starting pass over {}", window);

        let mut catalog = self.catalogs.open(window);
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<ItemOutcome>();
        let mut dispatched = 0_usize;

        let abort = loop {
            match catalog.next_item().await {
                Ok(Some(item)) => {
                    dispatched += 1;
                    self.dispatch(item, outcome_tx.clone());
                }
                Ok(None) => break None,
                Err(err) => {
                    flickrdown_error!(
                        "Catalog failed after {} items, aborting pass over {}: {}",
                        dispatched,
                        window,
                        err
                    );
                    break Some(err);
                }
            }
        };
        drop(catalog);
        // Each task holds a sender clone; the channel closes once all have reported.
        drop(outcome_tx);

        let mut result = PassResult::default();
        while let Some((id, outcome)) = outcome_rx.recv().await {
            match outcome {
                Ok(done) => {
                    flickrdown_debug!(
                        "Item {} written to {:?} ({} bytes)",
                        id,
                        done.path,
                        done.bytes
                    );
                    result.succeeded += 1;
                }
                Err(error) => {
                    flickrdown_error!("Failed to process item {}: {}", id, error);
                    result.failures.push(ItemFailure { id, error });
                }
            }
        }
        if result.total() != dispatched {
            flickrdown_warn!(
                "{} items dispatched but {} reported in pass over {}",
                dispatched,
                result.total(),
                window
            );
        }

        if let Some(err) = abort {
            return Err(PassError::Aborted(err));
        }

        flickrdown_info!(
            "Pass over {} complete: {} succeeded, {} failed",
            window,
            result.succeeded,
            result.failed()
        );
        Ok(result)
    }

    fn dispatch(&self, item: RemoteItem, outcome_tx: mpsc::UnboundedSender<ItemOutcome>) {
        let processor = Arc::clone(&self.processor);
        let id = item.id().clone();
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(processor.process(item))
                .catch_unwind()
                .await
                .unwrap_or(Err(ProcessError::Panicked));
            let _ = outcome_tx.send((id, outcome));
        });
    }
}

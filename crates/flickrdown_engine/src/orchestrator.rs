use flickrdown_core::BeginEvent;
use flickrdown_logging::{flickrdown_error, flickrdown_info, flickrdown_warn};
use tokio_util::sync::CancellationToken;

use crate::{BatchRunner, BeginEvents, CoalescerHandle, PassError, PassResult, Window, WindowError};

/// Chooses the window for each pass and learns how it went.
pub trait WindowPlanner: Send {
    fn plan(&mut self, begin: BeginEvent) -> Result<Window, WindowError>;

    /// Called once per planned window after its pass settles.
    fn settled(&mut self, window: &Window, outcome: &Result<PassResult, PassError>);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    pub passes: usize,
    pub failed_passes: usize,
}

/// Glue between begin events and the batch runner.
pub struct Orchestrator<P> {
    runner: BatchRunner,
    coalescer: CoalescerHandle,
    planner: P,
    shutdown: CancellationToken,
    stats: OrchestratorStats,
}

impl<P: WindowPlanner> Orchestrator<P> {
    pub fn new(runner: BatchRunner, coalescer: CoalescerHandle, planner: P) -> Self {
        Self {
            runner,
            coalescer,
            planner,
            shutdown: CancellationToken::new(),
            stats: OrchestratorStats::default(),
        }
    }

    /// Stops `run` between passes once `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn planner(&self) -> &P {
        &self.planner
    }

    pub fn stats(&self) -> OrchestratorStats {
        self.stats
    }

    /// Runs a pass for every begin event until the stream ends or shutdown is requested.
    ///
    /// A pass in flight is never interrupted.
    pub async fn run(&mut self, begins: &mut BeginEvents) -> OrchestratorStats {
        loop {
            let begin = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    flickrdown_info!(
                        "Shutdown requested, stopping after {} passes",
                        self.stats.passes
                    );
                    break;
                }
                begin = begins.next_begin() => match begin {
                    Some(begin) => begin,
                    None => break,
                },
            };
            let _ = self.run_one(begin).await;
        }
        self.stats
    }

    /// Runs the pass for one begin event and reports its completion to the coalescer.
    pub async fn run_one(&mut self, begin: BeginEvent) -> Result<PassResult, PassError> {
        let kind = if begin.immediate { "triggered" } else { "queued" };

        let outcome = match self.planner.plan(begin) {
            Ok(window) => {
                flickrdown_info!("Beginning {} pass over {}", kind, window);
                let outcome = self.runner.run_pass(window).await;
                self.planner.settled(&window, &outcome);
                outcome
            }
            Err(err) => {
                flickrdown_error!("Could not plan {} pass: {}", kind, err);
                Err(PassError::InvalidWindow(err))
            }
        };

        self.stats.passes += 1;
        match &outcome {
            Ok(result) => {
                if let Err(summary) = result.ensure_success() {
                    self.stats.failed_passes += 1;
                    flickrdown_warn!("Pass finished with failures: {}", summary);
                }
            }
            Err(err) => {
                self.stats.failed_passes += 1;
                flickrdown_error!("Pass failed: {}", err);
            }
        }

        self.coalescer.notify_complete();
        outcome
    }
}

//! Single-consumer inbox driving the pure coalescer state machine.
//!
//! Every signal source is forwarded into one FIFO inbox. One task owns the
//! `CoalescerState`, applies `flickrdown_core::update` to each message in
//! arrival order, and publishes begin events to the subscriber.

use std::pin::Pin;
use std::task::{Context, Poll};

use flickrdown_core::{update, BeginEvent, CoalescerState, Effect, Signal};
use flickrdown_logging::{flickrdown_debug, flickrdown_error, flickrdown_info, flickrdown_warn};
use futures_util::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};

enum Inbox {
    Signal(Signal),
    Snapshot(oneshot::Sender<CoalescerState>),
}

/// Sends signals to a running coalescer. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CoalescerHandle {
    inbox: mpsc::UnboundedSender<Inbox>,
}

impl CoalescerHandle {
    /// Asks for a pass as if a change had been observed.
    pub fn request_now(&self) {
        self.send(Signal::ManualRequest);
    }

    pub fn external_change(&self) {
        self.send(Signal::ExternalChange);
    }

    /// Reports that the pass started by the last begin event has settled.
    ///
    /// Must be called exactly once per begin event, whatever the pass outcome;
    /// no further pass starts until it is.
    pub fn notify_complete(&self) {
        self.send(Signal::PassCompleted);
    }

    /// State after every signal sent through this handle so far has been applied.
    ///
    /// `None` once the coalescer has stopped.
    pub async fn state(&self) -> Option<CoalescerState> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inbox.send(Inbox::Snapshot(reply_tx)).ok()?;
        reply_rx.await.ok()
    }

    fn send(&self, signal: Signal) {
        if self.inbox.send(Inbox::Signal(signal)).is_err() {
            flickrdown_warn!("Coalescer has stopped, dropping {:?}", signal);
        }
    }
}

/// Stream of begin events from one subscription.
#[derive(Debug)]
pub struct BeginEvents {
    rx: mpsc::UnboundedReceiver<BeginEvent>,
}

impl BeginEvents {
    pub async fn next_begin(&mut self) -> Option<BeginEvent> {
        self.rx.recv().await
    }

    /// A begin event that has already been published, if any.
    pub fn try_next_begin(&mut self) -> Option<BeginEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for BeginEvents {
    type Item = BeginEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Starts a fresh coalescer in `Idle` fed by `triggers` and `completions`.
///
/// Each item of `triggers` counts as an external change and each item of
/// `completions` as a pass completion. The returned handle feeds the same
/// inbox. The coalescer stops when all producers are gone or the returned
/// `BeginEvents` is dropped. Must be called from within a tokio runtime.
pub fn subscribe<T, C>(triggers: T, completions: C) -> (CoalescerHandle, BeginEvents)
where
    T: Stream<Item = ()> + Send + 'static,
    C: Stream<Item = ()> + Send + 'static,
{
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let (begin_tx, begin_rx) = mpsc::unbounded_channel();

    forward(triggers, Signal::ExternalChange, inbox_tx.clone());
    forward(completions, Signal::PassCompleted, inbox_tx.clone());
    tokio::spawn(run_inbox(inbox_rx, begin_tx));

    (
        CoalescerHandle { inbox: inbox_tx },
        BeginEvents { rx: begin_rx },
    )
}

fn forward<S>(source: S, signal: Signal, inbox: mpsc::UnboundedSender<Inbox>)
where
    S: Stream<Item = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut source = Box::pin(source);
        while source.next().await.is_some() {
            if inbox.send(Inbox::Signal(signal)).is_err() {
                break;
            }
        }
    });
}

async fn run_inbox(
    mut inbox: mpsc::UnboundedReceiver<Inbox>,
    begins: mpsc::UnboundedSender<BeginEvent>,
) {
    let mut state = CoalescerState::new();

    while let Some(message) = inbox.recv().await {
        let signal = match message {
            Inbox::Snapshot(reply) => {
                let _ = reply.send(state);
                continue;
            }
            Inbox::Signal(signal) => signal,
        };

        if signal == Signal::ExternalChange {
            flickrdown_info!("Change detected");
        }
        let (next, effects) = update(state, signal);
        state = next;

        for effect in effects {
            match effect {
                Effect::Begin(begin) => {
                    if begin.immediate {
                        flickrdown_info!("Processing triggered");
                    } else {
                        flickrdown_info!("Processing complete, queued processing triggered");
                    }
                    if begins.send(begin).is_err() {
                        flickrdown_debug!("Begin subscriber dropped, stopping coalescer");
                        return;
                    }
                }
                Effect::Queued { trigger } => flickrdown_info!("Processing queued ({:?})", trigger),
                Effect::Completed => flickrdown_info!("Processing complete"),
                Effect::UnexpectedCompletion => {
                    flickrdown_error!("Not marked as processing at completion of processing")
                }
            }
        }
    }
    flickrdown_debug!("Coalescer inbox closed");
}

use crate::{BeginEvent, CoalescerState, Effect, Signal};

/// Pure update function: applies a signal to the coalescer state and returns any effects.
///
/// At most one `Effect::Begin` is outstanding at a time, and any number of
/// triggers received while processing collapse into a single deferred begin.
pub fn update(state: CoalescerState, signal: Signal) -> (CoalescerState, Vec<Effect>) {
    match (state, signal) {
        (CoalescerState::Idle, Signal::ExternalChange | Signal::ManualRequest) => (
            CoalescerState::Processing,
            vec![Effect::Begin(BeginEvent::immediate())],
        ),
        (CoalescerState::Idle, Signal::PassCompleted) => {
            (CoalescerState::Idle, vec![Effect::UnexpectedCompletion])
        }
        (CoalescerState::Processing, trigger @ (Signal::ExternalChange | Signal::ManualRequest)) => (
            CoalescerState::ProcessingWithQueued,
            vec![Effect::Queued { trigger }],
        ),
        (CoalescerState::Processing, Signal::PassCompleted) => {
            (CoalescerState::Idle, vec![Effect::Completed])
        }
        (CoalescerState::ProcessingWithQueued, Signal::ExternalChange | Signal::ManualRequest) => {
            (CoalescerState::ProcessingWithQueued, Vec::new())
        }
        (CoalescerState::ProcessingWithQueued, Signal::PassCompleted) => (
            CoalescerState::Processing,
            vec![Effect::Begin(BeginEvent::deferred())],
        ),
    }
}

/// Applies signals in order, concatenating their effects.
pub fn update_all(
    state: CoalescerState,
    signals: impl IntoIterator<Item = Signal>,
) -> (CoalescerState, Vec<Effect>) {
    signals
        .into_iter()
        .fold((state, Vec::new()), |(state, mut effects), signal| {
            let (next, produced) = update(state, signal);
            effects.extend(produced);
            (next, effects)
        })
}

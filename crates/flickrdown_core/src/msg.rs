#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// A watched source reported a change (file event, sweep timer).
    ExternalChange,
    /// Someone asked for a pass right now.
    ManualRequest,
    /// The pass started by the last `BeginEvent` has settled.
    PassCompleted,
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoalescerState {
    #[default]
    Idle,
    Processing,
    /// A pass is running and at least one trigger arrived since it began.
    ProcessingWithQueued,
}

impl CoalescerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a `BeginEvent` is outstanding without its completion.
    pub fn is_processing(self) -> bool {
        !matches!(self, CoalescerState::Idle)
    }

    pub fn has_queued(self) -> bool {
        matches!(self, CoalescerState::ProcessingWithQueued)
    }
}

use crate::Signal;

/// Request to start a pass.
///
/// `immediate` is true when the pass answers a trigger that arrived while idle,
/// false when it drains a trigger queued behind the previous pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeginEvent {
    pub immediate: bool,
}

impl BeginEvent {
    pub fn immediate() -> Self {
        Self { immediate: true }
    }

    pub fn deferred() -> Self {
        Self { immediate: false }
    }

    pub fn is_deferred(self) -> bool {
        !self.immediate
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start a pass.
    Begin(BeginEvent),
    /// A trigger arrived mid-pass and a follow-up pass is now owed.
    Queued { trigger: Signal },
    /// The outstanding pass settled and nothing was queued behind it.
    Completed,
    /// A completion arrived with no pass outstanding.
    UnexpectedCompletion,
}

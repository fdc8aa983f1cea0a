//! Flickrdown core: the pure trigger-coalescing state machine.
mod effect;
mod msg;
mod state;
mod update;

pub use effect::{BeginEvent, Effect};
pub use msg::Signal;
pub use state::CoalescerState;
pub use update::{update, update_all};

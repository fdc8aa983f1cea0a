use std::sync::Once;

use flickrdown_core::{update, update_all, BeginEvent, CoalescerState, Effect, Signal};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(flickrdown_logging::initialize_for_tests);
}

fn begins(effects: &[Effect]) -> Vec<BeginEvent> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Begin(begin) => Some(*begin),
            _ => None,
        })
        .collect()
}

#[test]
fn burst_while_idle_then_burst_while_processing() {
    init_logging();
    let (state, effects) = update_all(
        CoalescerState::Idle,
        [
            Signal::ExternalChange,
            Signal::ExternalChange,
            Signal::ManualRequest,
        ],
    );
    assert_eq!(begins(&effects), vec![BeginEvent::immediate()]);
    assert!(state.is_processing());

    let (state, effects) = update_all(state, [Signal::ExternalChange, Signal::ExternalChange]);
    assert!(begins(&effects).is_empty());

    let (state, effects) = update(state, Signal::PassCompleted);
    assert_eq!(begins(&effects), vec![BeginEvent::deferred()]);
    assert_eq!(state, CoalescerState::Processing);

    let (state, effects) = update(state, Signal::PassCompleted);
    assert!(begins(&effects).is_empty());
    assert_eq!(state, CoalescerState::Idle);
}

#[test]
fn any_burst_during_a_pass_yields_exactly_one_follow_up() {
    init_logging();
    for burst in 1..50 {
        let (state, _) = update(CoalescerState::Idle, Signal::ManualRequest);
        let triggers = (0..burst).map(|i| {
            if i % 3 == 0 {
                Signal::ManualRequest
            } else {
                Signal::ExternalChange
            }
        });
        let (state, effects) = update_all(state, triggers);
        assert!(begins(&effects).is_empty(), "burst {burst} began early");

        let (state, effects) = update_all(state, [Signal::PassCompleted, Signal::PassCompleted]);
        assert_eq!(begins(&effects), vec![BeginEvent::deferred()], "burst {burst}");
        assert_eq!(state, CoalescerState::Idle);
    }
}

#[test]
fn never_more_than_one_begin_outstanding() {
    init_logging();
    let signals = [
        Signal::ExternalChange,
        Signal::ManualRequest,
        Signal::PassCompleted,
        Signal::PassCompleted,
        Signal::PassCompleted,
        Signal::ExternalChange,
        Signal::ExternalChange,
        Signal::PassCompleted,
        Signal::ManualRequest,
        Signal::PassCompleted,
    ];

    let mut state = CoalescerState::Idle;
    let mut outstanding = 0_i32;
    for signal in signals {
        let (next, effects) = update(state, signal);
        for effect in &effects {
            match effect {
                Effect::Begin(_) => outstanding += 1,
                Effect::Completed => outstanding -= 1,
                _ => {}
            }
        }
        if signal == Signal::PassCompleted && next == CoalescerState::Processing {
            // completion immediately replaced by the deferred begin
            outstanding -= 1;
        }
        assert!((0..=1).contains(&outstanding), "after {signal:?}");
        assert_eq!(outstanding == 1, next.is_processing());
        state = next;
    }
}

#[test]
fn stray_completions_never_begin() {
    init_logging();
    let (state, effects) = update_all(
        CoalescerState::Idle,
        std::iter::repeat(Signal::PassCompleted).take(5),
    );
    assert_eq!(state, CoalescerState::Idle);
    assert!(begins(&effects).is_empty());
    assert_eq!(effects, vec![Effect::UnexpectedCompletion; 5]);
}

//! Property tests for the pure transition table: however events arrive, an
//! order's state only ever moves forward and each transition fires at most
//! once.

use framery_api::entities::order::{OrderEvent, OrderState};
use proptest::prelude::*;

fn rank(state: OrderState) -> u8 {
    match state {
        OrderState::New => 0,
        OrderState::Paid => 1,
        OrderState::Completed => 2,
    }
}

fn arb_event() -> impl Strategy<Value = OrderEvent> {
    prop_oneof![Just(OrderEvent::Pay), Just(OrderEvent::Complete)]
}

proptest! {
    #[test]
    fn state_never_moves_backward(events in proptest::collection::vec(arb_event(), 0..32)) {
        let mut state = OrderState::New;

        for event in events {
            let before = state;
            if let Some(next) = event.transition(state) {
                state = next;
            }
            prop_assert!(rank(state) >= rank(before));
            // Legal transitions advance exactly one step; nothing skips.
            prop_assert!(rank(state) - rank(before) <= 1);
        }
    }

    #[test]
    fn each_event_fires_at_most_once(events in proptest::collection::vec(arb_event(), 0..32)) {
        let mut state = OrderState::New;
        let mut pays = 0u32;
        let mut completes = 0u32;

        for event in events {
            if event.transition(state).is_some() {
                match event {
                    OrderEvent::Pay => pays += 1,
                    OrderEvent::Complete => completes += 1,
                }
                state = event.transition(state).unwrap();
            }
        }

        prop_assert!(pays <= 1);
        prop_assert!(completes <= 1);
        // Completion is only reachable through payment.
        prop_assert!(completes <= pays);
    }

    #[test]
    fn completed_is_terminal(events in proptest::collection::vec(arb_event(), 0..32)) {
        let state = OrderState::Completed;

        for event in events {
            prop_assert_eq!(event.transition(state), None);
        }
    }

    #[test]
    fn rejected_events_leave_state_untouched(events in proptest::collection::vec(arb_event(), 0..32)) {
        let mut state = OrderState::New;

        for event in events {
            match event.transition(state) {
                Some(next) => state = next,
                // The table returning None is the guard: the caller keeps
                // the order exactly as it was.
                None => {
                    let unchanged = state;
                    prop_assert_eq!(event.transition(state), None);
                    prop_assert_eq!(state, unchanged);
                }
            }
        }
    }
}

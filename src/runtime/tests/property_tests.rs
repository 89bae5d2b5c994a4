//! Property-based tests for the effect runtime
//!
//! Every case spawns execution contexts, so case counts stay small.

use proptest::collection::vec;
use proptest::prelude::*;

use crate::demos::product;
use crate::handlers::reader::{read_at, Reader};
use crate::handlers::state::{get, put, PlainState, State};
use crate::runtime::stack::Label;
use crate::runtime::{handle, handle_labelled, stats};

fn runtime_config() -> ProptestConfig {
    ProptestConfig::with_cases(24)
}

/// Depth of a reader nest and the labels to read from inside it
fn nest_strategy() -> impl Strategy<Value = (u32, Vec<u32>)> {
    (1u32..=8).prop_flat_map(|depth| (Just(depth), vec(1..=depth, 0..12)))
}

fn read_through_nest(level: u32, depth: u32, picks: Vec<u32>) -> Vec<u32> {
    if level <= depth {
        return handle_labelled(
            Label::new(level),
            Reader::<u32, Vec<u32>>::new(level * 10),
            move || read_through_nest(level + 1, depth, picks),
        );
    }
    picks
        .iter()
        .map(|&label| read_at::<u32>(Label::new(label)))
        .collect()
}

proptest! {
    #![proptest_config(runtime_config())]

    #[test]
    fn test_state_sums_like_fold(values in vec(0u64..1_000, 0..40)) {
        let expected: u64 = values.iter().sum();
        let input = values.clone();
        let total = handle(State::<u64, u64>::new(0), move || {
            for value in input {
                put(get::<u64>() + value);
            }
            get::<u64>()
        });
        prop_assert_eq!(total, expected);
    }

    #[test]
    fn test_plain_and_resuming_state_agree(values in vec(0i64..100, 0..20)) {
        let program = |values: Vec<i64>| {
            move || {
                for value in values {
                    put(get::<i64>() * 2 - value);
                }
                get::<i64>()
            }
        };
        let resuming = handle(State::<i64, i64>::new(1), program(values.clone()));
        let plain = handle(PlainState::<i64, i64>::new(1), program(values));
        prop_assert_eq!(resuming, plain);
    }

    #[test]
    fn test_product_short_circuits_on_zero(values in vec(-5i64..=5, 0..8)) {
        let expected = if values.contains(&0) {
            0
        } else {
            values.iter().product()
        };
        let before = stats().contexts_live;

        prop_assert_eq!(product(values), expected);
        prop_assert_eq!(stats().contexts_live, before);
    }

    #[test]
    fn test_labelled_reads_reach_their_reader((depth, picks) in nest_strategy()) {
        let expected: Vec<u32> = picks.iter().map(|label| label * 10).collect();
        prop_assert_eq!(read_through_nest(1, depth, picks), expected);
        prop_assert_eq!(stats().stack_depth, 0);
    }
}

use std::sync::Arc;

use crate::handlers::reader::{read, read_at, Reader};
use crate::handlers::state::{get, put, PlainState, State};
use crate::runtime::stack::Label;
use crate::runtime::{handle, handle_labelled, handle_with, stats};

#[test]
fn test_state_counts() {
    let state = Arc::new(State::<u32, u32>::new(0));
    let answer = handle_with(state.clone(), || {
        for _ in 0..10 {
            put(get::<u32>() + 1);
        }
        get::<u32>() * 2
    });

    assert_eq!(answer, 20);
    assert_eq!(state.current(), 10);
}

#[test]
fn test_plain_state_never_resumes() {
    let state = Arc::new(PlainState::<u32, u32>::new(0));
    let answer = handle_with(state.clone(), || {
        let before = stats();
        for _ in 0..10 {
            put(get::<u32>() + 1);
        }
        let after = stats();
        // Plain clauses never resume
        assert_eq!(after.resumptions, before.resumptions);
        get::<u32>()
    });

    assert_eq!(answer, 10);
    assert_eq!(state.current(), 10);
}

#[test]
fn test_states_of_different_types_coexist() {
    let answer = handle(State::<String, String>::new(String::from("a")), || {
        handle(State::<u32, String>::new(1), || {
            put(get::<u32>() + 1);
            put(format!("{}{}", get::<String>(), get::<u32>()));
            get::<String>()
        })
    });
    assert_eq!(answer, "a2");
}

#[test]
fn test_reader_returns_value() {
    let answer = handle(Reader::<&'static str, usize>::new("hello"), || read::<&'static str>().len());
    assert_eq!(answer, 5);
}

#[test]
fn test_read_at_label() {
    let answer = handle_labelled(Label::new(0), Reader::<u32, u32>::new(1), || {
        handle_labelled(Label::new(1), Reader::<u32, u32>::new(2), || {
            read_at::<u32>(Label::new(0)) * 10 + read::<u32>()
        })
    });
    assert_eq!(answer, 12);
}

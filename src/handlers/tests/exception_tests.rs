use crate::handlers::exception::{raise, Catch, WithDefault};
use crate::handlers::state::{get, put, State};
use crate::runtime::{handle, stats};

#[test]
fn test_with_default_replaces_raise() {
    let answer = handle(WithDefault::new(-1), || -> i32 { raise("nope") });
    assert_eq!(answer, -1);
}

#[test]
fn test_with_default_passes_normal_result() {
    assert_eq!(handle(WithDefault::new(-1), || 5), 5);
}

#[test]
fn test_catch_wraps_result() {
    assert_eq!(handle(Catch::<u8>::new(), || 3), Ok(3));
    assert_eq!(
        handle(Catch::<u8>::new(), || raise("bad input")),
        Err(String::from("bad input"))
    );
}

#[test]
fn test_raise_reaches_innermost_catch() {
    let outer = handle(Catch::<Result<u8, String>>::new(), || {
        handle(Catch::<u8>::new(), || raise("inner"))
    });
    assert_eq!(outer, Ok(Err(String::from("inner"))));
}

#[test]
fn test_raise_discards_handlers_in_between() {
    let before = stats();

    let answer = handle(WithDefault::new(0u32), || {
        handle(State::<u32, u32>::new(1), || {
            put(get::<u32>() + 1);
            raise::<u32>("deep")
        })
    });

    assert_eq!(answer, 0);
    let after = stats();
    assert_eq!(after.contexts_live, before.contexts_live);
    assert_eq!(after.stack_depth, before.stack_depth);
}

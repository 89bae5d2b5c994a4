//! Panics crossing context boundaries

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::helpers::*;
use crate::runtime::{handle, invoke, stats};
use crate::store::ResumptionSlot;

#[test]
fn test_body_panic_reaches_handle_caller() {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        handle(Const(1), || -> u32 { panic!("body exploded") })
    }));

    let payload = result.unwrap_err();
    assert_eq!(panic_message(&*payload), "body exploded");

    // The installation is gone and the runtime keeps working
    assert_eq!(stats().stack_depth, 0);
    assert_eq!(handle(Const(2), || invoke(Ask)), 2);
}

#[test]
fn test_nested_body_panic_unwinds_every_level() {
    let before = stats();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        handle(Const(1), || {
            handle(Const(2), || {
                let asked = invoke(Ask);
                if asked == 2 {
                    panic!("inner body exploded");
                }
                asked
            })
        })
    }));

    assert_eq!(panic_message(&*result.unwrap_err()), "inner body exploded");
    let after = stats();
    assert_eq!(after.stack_depth, before.stack_depth);
    assert_eq!(after.contexts_live, before.contexts_live);
}

#[test]
fn test_clause_panic_reaches_handle_caller() {
    let result = panic::catch_unwind(AssertUnwindSafe(|| handle(Exploding, || invoke(Ask))));

    assert_eq!(panic_message(&*result.unwrap_err()), "clause exploded");
    assert_eq!(stats().stack_depth, 0);
    assert_eq!(handle(Const(3), || invoke(Ask)), 3);
}

#[test]
fn test_panic_after_resume_reaches_resumer() {
    let slot = Arc::new(ResumptionSlot::new());
    handle(Parking { slot: slot.clone() }, || -> i32 {
        invoke(Pause);
        panic!("resumed body exploded")
    });

    let k = slot.take_as::<(), i32>().unwrap();
    let result = panic::catch_unwind(AssertUnwindSafe(move || k.resume(())));

    assert_eq!(panic_message(&*result.unwrap_err()), "resumed body exploded");
    assert_eq!(stats().stack_depth, 0);
}

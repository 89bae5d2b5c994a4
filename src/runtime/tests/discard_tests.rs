//! Discarding suspended computations

use std::sync::Arc;

use super::helpers::*;
use crate::runtime::{handle, invoke, stats};
use crate::store::ResumptionSlot;

#[test]
fn test_discard_runs_destructors_of_suspended_body() {
    let slot = Arc::new(ResumptionSlot::new());
    let log = Log::new();
    let probe_log = log.clone();
    let before = stats();

    handle(Parking { slot: slot.clone() }, move || {
        let _probe = DropProbe {
            name: "dropped",
            log: probe_log,
        };
        invoke(Pause);
        1
    });

    // Still suspended: nothing was dropped yet
    assert_eq!(log.contents(), "");
    assert_eq!(stats().contexts_live, before.contexts_live + 1);

    slot.take_as::<(), i32>().unwrap().discard();

    assert_eq!(log.contents(), "dropped");
    let after = stats();
    assert_eq!(after.contexts_live, before.contexts_live);
    assert_eq!(after.resumptions_discarded, before.resumptions_discarded + 1);
}

#[test]
fn test_discard_unwinds_nested_installations() {
    let slot = Arc::new(ResumptionSlot::new());
    let log = Log::new();
    let (outer_log, inner_log) = (log.clone(), log.clone());
    let before = stats();

    handle(Parking { slot: slot.clone() }, move || {
        let _outer = DropProbe {
            name: "[outer]",
            log: outer_log,
        };
        handle(Const(3), move || {
            let _inner = DropProbe {
                name: "[inner]",
                log: inner_log,
            };
            invoke(Pause);
            invoke(Ask)
        }) as i32
    });

    slot.take_as::<(), i32>().unwrap().discard();

    // Innermost context unwinds first
    assert_eq!(log.contents(), "[inner][outer]");
    assert_eq!(stats().contexts_live, before.contexts_live);
}

#[test]
fn test_abort_discards_invoker() {
    let log = Log::new();
    let (catch_log, probe_log) = (log.clone(), log.clone());

    let answer = handle(Catch { log: catch_log }, move || {
        let _probe = DropProbe {
            name: "[probe]",
            log: probe_log,
        };
        invoke(Error);
        1
    });

    assert_eq!(answer, 42);
    assert_eq!(log.contents(), "[probe][caught]");
}

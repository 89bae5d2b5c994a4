//! Test helpers for runtime tests
//!
//! Small handlers and a shared log used across the test files

use std::sync::Arc;

use parking_lot::Mutex;

use crate::handler::{Clauses, Command, Handler, Handles, HandlesAbort, HandlesPlain};
use crate::runtime::{invoke, Reply, Resumption};

/// Text appended to from inside handled computations
#[derive(Debug, Clone, Default)]
pub struct Log(Arc<Mutex<String>>);

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, text: &str) {
        self.0.lock().push_str(text);
    }

    pub fn contents(&self) -> String {
        self.0.lock().clone()
    }
}

/* ===================== Ask ===================== */

/// Asks the innermost `Const` for its value
pub struct Ask;

impl Command for Ask {
    type Out = u32;
}

/// Answers `Ask` with a fixed value by resuming
pub struct Const(pub u32);

impl Handler for Const {
    type Answer = u32;
    type Body = u32;

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.on::<Ask>();
    }

    fn handle_return(&self, value: u32) -> u32 {
        value
    }
}

impl Handles<Ask> for Const {
    fn handle_command(&self, _: Ask, k: Resumption<u32, u32>) -> Reply<u32> {
        Reply::Answer(k.resume(self.0))
    }
}

/// Answers `Ask` with whatever the next handler out answers, plus an offset
pub struct Forward(pub u32);

impl Handler for Forward {
    type Answer = u32;
    type Body = u32;

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.on::<Ask>();
    }

    fn handle_return(&self, value: u32) -> u32 {
        value
    }
}

impl Handles<Ask> for Forward {
    fn handle_command(&self, _: Ask, k: Resumption<u32, u32>) -> Reply<u32> {
        let outer = invoke(Ask);
        k.tail_resume(outer + self.0)
    }
}

/* ===================== Print / Error ===================== */

pub struct Print;

impl Command for Print {
    type Out = ();
}

/// Logs its message on every `Print`; adds one to the answer
pub struct Printer {
    pub message: &'static str,
    pub log: Log,
}

impl Handler for Printer {
    type Answer = i32;
    type Body = i32;

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.on::<Print>();
    }

    fn handle_return(&self, value: i32) -> i32 {
        value + 1
    }
}

impl Handles<Print> for Printer {
    fn handle_command(&self, _: Print, k: Resumption<(), i32>) -> Reply<i32> {
        self.log.push(self.message);
        Reply::Answer(k.resume(()))
    }
}

pub struct Error;

impl Command for Error {
    type Out = ();
}

/// Answers 42 on `Error` without resuming; adds 100 to a normal answer
pub struct Catch {
    pub log: Log,
}

impl Handler for Catch {
    type Answer = i32;
    type Body = i32;

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.abort::<Error>();
    }

    fn handle_return(&self, value: i32) -> i32 {
        value + 100
    }
}

impl HandlesAbort<Error> for Catch {
    fn handle_abort(&self, _: Error) -> i32 {
        self.log.push("[caught]");
        42
    }
}

/* ===================== Plain ===================== */

/// Answers `Ask` in place by raising an `Error`
pub struct RaisingAsk;

impl Handler for RaisingAsk {
    type Answer = i32;
    type Body = i32;

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.plain::<Ask>();
    }

    fn handle_return(&self, value: i32) -> i32 {
        value
    }
}

impl HandlesPlain<Ask> for RaisingAsk {
    fn handle_plain(&self, _: Ask) -> u32 {
        invoke(Error);
        0
    }
}

/// Records its name when dropped
pub struct DropProbe {
    pub name: &'static str,
    pub log: Log,
}

impl Drop for DropProbe {
    fn drop(&mut self) {
        self.log.push(self.name);
    }
}

/* ===================== Return clauses ===================== */

/// Answers `Ask` with its value; the return clause asks again
pub struct Echo(pub u32);

impl Handler for Echo {
    type Answer = u32;
    type Body = u32;

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.on::<Ask>();
    }

    fn handle_return(&self, value: u32) -> u32 {
        value + invoke(Ask) * 100
    }
}

impl Handles<Ask> for Echo {
    fn handle_command(&self, _: Ask, k: Resumption<u32, u32>) -> Reply<u32> {
        k.tail_resume(self.0)
    }
}

/// Drops the resumption and answers 100; a normal return answers 10
pub struct Leaky;

impl Handler for Leaky {
    type Answer = u32;
    type Body = u32;

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.on::<Ask>();
    }

    fn handle_return(&self, _: u32) -> u32 {
        10
    }
}

impl Handles<Ask> for Leaky {
    fn handle_command(&self, _: Ask, k: Resumption<u32, u32>) -> Reply<u32> {
        drop(k);
        Reply::Answer(100)
    }
}

/// Panics inside its clause
pub struct Exploding;

impl Handler for Exploding {
    type Answer = u32;
    type Body = u32;

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.on::<Ask>();
    }

    fn handle_return(&self, value: u32) -> u32 {
        value
    }
}

impl Handles<Ask> for Exploding {
    fn handle_command(&self, _: Ask, _k: Resumption<u32, u32>) -> Reply<u32> {
        panic!("clause exploded")
    }
}

/* ===================== Parking ===================== */

pub struct Pause;

impl Command for Pause {
    type Out = ();
}

/// Parks the computation in a slot and answers 0
pub struct Parking {
    pub slot: Arc<crate::store::ResumptionSlot>,
}

impl Handler for Parking {
    type Answer = i32;
    type Body = i32;

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.on::<Pause>();
    }

    fn handle_return(&self, value: i32) -> i32 {
        value
    }
}

impl Handles<Pause> for Parking {
    fn handle_command(&self, _: Pause, k: Resumption<(), i32>) -> Reply<i32> {
        if let Err(rejected) = self.slot.put(k.release()) {
            Resumption::<(), i32>::reconstitute(rejected).discard();
        }
        Reply::Answer(0)
    }
}

/// Panic payload as text
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        String::from("<non-string panic>")
    }
}

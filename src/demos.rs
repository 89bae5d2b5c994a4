//! Small programs exercising the runtime end to end
//!
//! Each demo returns the lines it would print, so the CLI can show them and
//! the tests can compare them.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::handler::{Clauses, Command, Handler, Handles};
use crate::handlers::exception::{raise, Catch, WithDefault};
use crate::handlers::generator::Generator;
use crate::handlers::reader::{read, read_at, Reader};
use crate::handlers::relocate::{handle_swappable, swap_handler};
use crate::handlers::state::{get, put, PlainState, State};
use crate::runtime::stack::Label;
use crate::runtime::{handle, handle_labelled, handle_with, invoke, Reply, Resumption};
use crate::store::ResumptionSlot;

/// Output collected from inside handled computations
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(&self, line: impl Into<String>) {
        self.lines.lock().push(line.into());
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

/* ===================== State ===================== */

fn counter_program(t: Transcript) {
    let mut line = vec![get::<i64>().to_string()];
    put(get::<i64>() + 1);
    line.push(get::<i64>().to_string());
    put(get::<i64>() * get::<i64>());
    line.push(get::<i64>().to_string());
    t.say(line.join(" "));
}

/// `100 101 10201` through both state handlers
pub fn state() -> Vec<String> {
    let t = Transcript::new();

    let tail = Arc::new(State::<i64, ()>::new(100));
    let out = t.clone();
    handle_with(tail.clone(), move || counter_program(out));

    let plain = Arc::new(PlainState::<i64, ()>::new(100));
    let out = t.clone();
    handle_with(plain.clone(), move || counter_program(out));

    t.say(format!("final states: {} {}", tail.current(), plain.current()));
    t.lines()
}

/* ===================== Exceptions ===================== */

pub fn product(values: Vec<i64>) -> i64 {
    handle(WithDefault::new(0), move || {
        values.iter().fold(1, |acc, &value| {
            if value == 0 {
                raise("zero in product")
            } else {
                acc * value
            }
        })
    })
}

pub fn exceptions() -> Vec<String> {
    let t = Transcript::new();
    for values in [vec![1, 2, 0, 4, 5], vec![1, 2, 3, 4, 5]] {
        let label = format!("{:?}", values);
        t.say(format!("product {} = {}", label, product(values)));
    }

    match handle(Catch::<i64>::new(), || raise("something went wrong")) {
        Ok(value) => t.say(format!("no exception: {}", value)),
        Err(message) => t.say(format!("caught: {}", message)),
    }
    t.lines()
}

/* ===================== Generators ===================== */

pub const PEAKS: [&str; 5] = ["Everest", "K2", "Kangchenjunga", "Lhotse", "Makalu"];

/// Infinite naturals zipped with a finite list of mountains
pub fn generators() -> Vec<String> {
    let naturals = Generator::new(|co| {
        let mut n = 1u32;
        loop {
            co.yield_value(n);
            n += 1;
        }
    });
    let peaks = Generator::new(|co| {
        for peak in PEAKS {
            co.yield_value(peak.to_string());
        }
    });

    naturals
        .zip(peaks)
        .map(|(n, peak)| format!("{} {}", n, peak))
        .collect()
}

/* ===================== Relocation ===================== */

fn set(value: i32) {
    swap_handler(Reader::<i32, i32>::new(value));
}

/// A reader whose value is changed by swapping in new readers
pub fn swap() -> Vec<String> {
    let t = Transcript::new();
    let out = t.clone();
    let answer = handle_swappable(Reader::<i32, i32>::new(100), move || {
        out.say(read::<i32>().to_string());
        set(read::<i32>() + 10);
        out.say(read::<i32>().to_string());
        set(200);
        set(300);
        set(read::<i32>() + 10);
        out.say(read::<i32>().to_string());
        out.say(read::<i32>().to_string());
        set(read::<i32>() + 10);
        out.say(read::<i32>().to_string());
        18
    });
    t.say(answer.to_string());
    t.lines()
}

/* ===================== Labels ===================== */

fn nest(level: u32, depth: u32, t: Transcript) {
    if level <= depth {
        handle_labelled(Label::new(level), Reader::<u32, ()>::new(level), move || {
            nest(level + 1, depth, t)
        });
        return;
    }

    let values: Vec<String> = (0..200u32)
        .step_by(7)
        .map(|i| read_at::<u32>(Label::new(i % depth + 1)).to_string())
        .collect();
    t.say(values.join(" "));
}

/// Nested readers, each read addressed to a specific one by label
pub fn labels() -> Vec<String> {
    let t = Transcript::new();
    nest(1, 10, t.clone());
    t.lines()
}

/* ===================== Stored resumptions ===================== */

pub struct Inc;

impl Command for Inc {
    type Out = ();
}

pub struct Break;

impl Command for Break {
    type Out = ();
}

/// Counts increments after each break; breaks park the computation in a slot
pub struct Counter {
    pub slot: Arc<ResumptionSlot>,
}

impl Handler for Counter {
    type Answer = i32;
    type Body = i32;

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.on::<Inc>().on::<Break>();
    }

    fn handle_return(&self, value: i32) -> i32 {
        value
    }
}

impl Handles<Inc> for Counter {
    fn handle_command(&self, _: Inc, k: Resumption<(), i32>) -> Reply<i32> {
        Reply::Answer(k.resume(()) + 1)
    }
}

impl Handles<Break> for Counter {
    fn handle_command(&self, _: Break, k: Resumption<(), i32>) -> Reply<i32> {
        if let Err(rejected) = self.slot.put(k.release()) {
            tracing::warn!("slot already holds a resumption, discarding the new one");
            Resumption::<(), i32>::reconstitute(rejected).discard();
        }
        Reply::Answer(0)
    }
}

/// A computation finished piecewise after its handler returned
pub fn stored() -> Vec<String> {
    let slot = Arc::new(ResumptionSlot::new());
    let first = handle(Counter { slot: slot.clone() }, || {
        invoke(Inc);
        invoke(Inc);
        invoke(Break);
        invoke(Inc);
        invoke(Break);
        invoke(Inc);
        100
    });

    let mut lines = vec![first.to_string()];
    while let Some(k) = slot.take_as::<(), i32>() {
        lines.push(k.resume(()).to_string());
    }
    lines
}

//! Generators
//!
//! A [`Generator`] runs a producer in its own handled computation and turns
//! each yielded value into an iterator item. Between items the producer is
//! suspended in a resumption owned by the generator. Every generator yields
//! to its own label, so producers can freely consume other generators.
//!
//! ```
//! use effects_core::handlers::generator::Generator;
//!
//! let evens = Generator::new(|co| {
//!     for n in 0..5 {
//!         co.yield_value(n * 2);
//!     }
//! });
//! assert_eq!(evens.collect::<Vec<_>>(), vec![0, 2, 4, 6, 8]);
//! ```

use std::fmt;
use std::marker::PhantomData;

use crate::handler::{Clauses, Command, Handler, Handles};
use crate::runtime::stack::Label;
use crate::runtime::{handle_labelled, invoke_at, Reply, Resumption};

/// Hand a value to the consumer and wait for the next request
pub struct Yield<T>(pub T);

impl<T: Send + 'static> Command for Yield<T> {
    type Out = ();
}

/// The producer side of a generator
pub struct Yielder<T> {
    label: Label,
    _item: PhantomData<fn(T)>,
}

impl<T: Send + 'static> Yielder<T> {
    pub fn yield_value(&self, value: T) {
        invoke_at(self.label, Yield(value))
    }
}

/// Where the producer stopped
enum Step<T> {
    Yielded(T, Resumption<(), Step<T>>),
    Done,
}

struct Yields<T> {
    _item: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Handler for Yields<T> {
    type Answer = Step<T>;
    type Body = ();

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.on::<Yield<T>>();
    }

    fn handle_return(&self, _: ()) -> Step<T> {
        Step::Done
    }
}

impl<T: Send + 'static> Handles<Yield<T>> for Yields<T> {
    fn handle_command(
        &self,
        Yield(value): Yield<T>,
        k: Resumption<(), Step<T>>,
    ) -> Reply<Step<T>> {
        Reply::Answer(Step::Yielded(value, k))
    }
}

type Producer<T> = Box<dyn FnOnce(Yielder<T>) + Send>;

enum State<T> {
    Fresh(Producer<T>),
    Suspended(Resumption<(), Step<T>>),
    Done,
}

/// Iterator over the values a producer yields
pub struct Generator<T> {
    label: Label,
    state: State<T>,
}

impl<T: Send + 'static> Generator<T> {
    pub fn new<F>(producer: F) -> Self
    where
        F: FnOnce(Yielder<T>) + Send + 'static,
    {
        Generator {
            label: Label::fresh(),
            state: State::Fresh(Box::new(producer)),
        }
    }

    /// Whether the producer has returned
    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }
}

impl<T: Send + 'static> Iterator for Generator<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let step = match std::mem::replace(&mut self.state, State::Done) {
            State::Fresh(producer) => {
                let label = self.label;
                let handler = Yields { _item: PhantomData };
                handle_labelled(label, handler, move || {
                    producer(Yielder {
                        label,
                        _item: PhantomData,
                    })
                })
            }
            State::Suspended(k) => k.resume(()),
            State::Done => return None,
        };

        match step {
            Step::Yielded(value, k) => {
                self.state = State::Suspended(k);
                Some(value)
            }
            Step::Done => None,
        }
    }
}

impl<T> Drop for Generator<T> {
    fn drop(&mut self) {
        if let State::Suspended(k) = std::mem::replace(&mut self.state, State::Done) {
            k.discard();
        }
    }
}

impl<T> fmt::Debug for Generator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Fresh(_) => "fresh",
            State::Suspended(_) => "suspended",
            State::Done => "done",
        };
        f.debug_struct("Generator")
            .field("label", &self.label)
            .field("state", &state)
            .finish()
    }
}

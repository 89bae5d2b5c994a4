//! Mutable state
//!
//! [`State`] answers `Get`/`Put` with suspending clauses that tail-resume,
//! [`PlainState`] answers them in place. Both keep the state behind a lock
//! so it can be read after the handled computation is done.

use std::marker::PhantomData;

use parking_lot::Mutex;

use crate::handler::{Clauses, Command, Handler, Handles, HandlesPlain};
use crate::runtime::{invoke, Reply, Resumption};

/// Read the current state
pub struct Get<S> {
    _state: PhantomData<fn() -> S>,
}

impl<S> Get<S> {
    pub fn new() -> Self {
        Get {
            _state: PhantomData,
        }
    }
}

impl<S> Default for Get<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Send + 'static> Command for Get<S> {
    type Out = S;
}

/// Replace the current state
pub struct Put<S>(pub S);

impl<S: Send + 'static> Command for Put<S> {
    type Out = ();
}

pub fn get<S: Send + 'static>() -> S {
    invoke(Get::<S>::new())
}

pub fn put<S: Send + 'static>(state: S) {
    invoke(Put(state))
}

/* ===================== State ===================== */

/// State handler whose clauses resume in tail position
pub struct State<S, A> {
    state: Mutex<S>,
    _answer: PhantomData<fn() -> A>,
}

impl<S, A> State<S, A> {
    pub fn new(initial: S) -> Self {
        State {
            state: Mutex::new(initial),
            _answer: PhantomData,
        }
    }

    pub fn current(&self) -> S
    where
        S: Clone,
    {
        self.state.lock().clone()
    }
}

impl<S, A> Handler for State<S, A>
where
    S: Clone + Send + 'static,
    A: Send + 'static,
{
    type Answer = A;
    type Body = A;

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.on::<Get<S>>().on::<Put<S>>();
    }

    fn handle_return(&self, value: A) -> A {
        value
    }
}

impl<S, A> Handles<Get<S>> for State<S, A>
where
    S: Clone + Send + 'static,
    A: Send + 'static,
{
    fn handle_command(&self, _: Get<S>, k: Resumption<S, A>) -> Reply<A> {
        let state = self.state.lock().clone();
        k.tail_resume(state)
    }
}

impl<S, A> Handles<Put<S>> for State<S, A>
where
    S: Clone + Send + 'static,
    A: Send + 'static,
{
    fn handle_command(&self, Put(state): Put<S>, k: Resumption<(), A>) -> Reply<A> {
        *self.state.lock() = state;
        k.tail_resume(())
    }
}

/* ===================== PlainState ===================== */

/// State handler answering in the invoker's context
pub struct PlainState<S, A> {
    state: Mutex<S>,
    _answer: PhantomData<fn() -> A>,
}

impl<S, A> PlainState<S, A> {
    pub fn new(initial: S) -> Self {
        PlainState {
            state: Mutex::new(initial),
            _answer: PhantomData,
        }
    }

    pub fn current(&self) -> S
    where
        S: Clone,
    {
        self.state.lock().clone()
    }
}

impl<S, A> Handler for PlainState<S, A>
where
    S: Clone + Send + 'static,
    A: Send + 'static,
{
    type Answer = A;
    type Body = A;

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.plain::<Get<S>>().plain::<Put<S>>();
    }

    fn handle_return(&self, value: A) -> A {
        value
    }
}

impl<S, A> HandlesPlain<Get<S>> for PlainState<S, A>
where
    S: Clone + Send + 'static,
    A: Send + 'static,
{
    fn handle_plain(&self, _: Get<S>) -> S {
        self.state.lock().clone()
    }
}

impl<S, A> HandlesPlain<Put<S>> for PlainState<S, A>
where
    S: Clone + Send + 'static,
    A: Send + 'static,
{
    fn handle_plain(&self, Put(state): Put<S>) {
        *self.state.lock() = state;
    }
}

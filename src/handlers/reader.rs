//! Reader: a value available to the handled computation

use std::marker::PhantomData;

use crate::handler::{Clauses, Command, Handler, Handles};
use crate::runtime::stack::Label;
use crate::runtime::{invoke, invoke_at, Reply, Resumption};

/// Ask for the environment value
pub struct Read<R> {
    _value: PhantomData<fn() -> R>,
}

impl<R> Read<R> {
    pub fn new() -> Self {
        Read {
            _value: PhantomData,
        }
    }
}

impl<R> Default for Read<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Send + 'static> Command for Read<R> {
    type Out = R;
}

pub fn read<R: Send + 'static>() -> R {
    invoke(Read::<R>::new())
}

/// Read from the reader installed with `label`
pub fn read_at<R: Send + 'static>(label: Label) -> R {
    invoke_at(label, Read::<R>::new())
}

pub struct Reader<R, A> {
    value: R,
    _answer: PhantomData<fn() -> A>,
}

impl<R, A> Reader<R, A> {
    pub fn new(value: R) -> Self {
        Reader {
            value,
            _answer: PhantomData,
        }
    }
}

impl<R, A> Handler for Reader<R, A>
where
    R: Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    type Answer = A;
    type Body = A;

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.on::<Read<R>>();
    }

    fn handle_return(&self, value: A) -> A {
        value
    }
}

impl<R, A> Handles<Read<R>> for Reader<R, A>
where
    R: Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    fn handle_command(&self, _: Read<R>, k: Resumption<R, A>) -> Reply<A> {
        k.tail_resume(self.value.clone())
    }
}

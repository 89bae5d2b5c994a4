//! Exceptions
//!
//! [`raise`] never returns: the handler discards the raising computation and
//! answers on its behalf.

use std::convert::Infallible;

use crate::handler::{Clauses, Command, Handler, HandlesAbort};
use crate::runtime::invoke;

/// Abort the computation with a message
#[derive(Debug, Clone)]
pub struct Raise {
    pub message: String,
}

impl Command for Raise {
    type Out = Infallible;
}

/// Raise an exception to the innermost exception handler
pub fn raise<T>(message: impl Into<String>) -> T {
    match invoke(Raise {
        message: message.into(),
    }) {}
}

/// Answers with a fixed value when the body raises
#[derive(Debug, Clone)]
pub struct WithDefault<T> {
    default: T,
}

impl<T> WithDefault<T> {
    pub fn new(default: T) -> Self {
        WithDefault { default }
    }
}

impl<T: Clone + Send + Sync + 'static> Handler for WithDefault<T> {
    type Answer = T;
    type Body = T;

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.abort::<Raise>();
    }

    fn handle_return(&self, value: T) -> T {
        value
    }
}

impl<T: Clone + Send + Sync + 'static> HandlesAbort<Raise> for WithDefault<T> {
    fn handle_abort(&self, raised: Raise) -> T {
        tracing::debug!(message = %raised.message, "exception replaced by default");
        self.default.clone()
    }
}

/// Turns the body's result into `Ok` and a raise into `Err`
#[derive(Debug)]
pub struct Catch<T> {
    _body: std::marker::PhantomData<fn() -> T>,
}

impl<T> Catch<T> {
    pub fn new() -> Self {
        Catch {
            _body: std::marker::PhantomData,
        }
    }
}

impl<T> Default for Catch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Handler for Catch<T> {
    type Answer = Result<T, String>;
    type Body = T;

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.abort::<Raise>();
    }

    fn handle_return(&self, value: T) -> Result<T, String> {
        Ok(value)
    }
}

impl<T: Send + 'static> HandlesAbort<Raise> for Catch<T> {
    fn handle_abort(&self, raised: Raise) -> Result<T, String> {
        Err(raised.message)
    }
}

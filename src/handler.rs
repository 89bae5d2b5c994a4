//! # Handler contract
//!
//! A handler is a type implementing [`Handler`] plus one clause trait per
//! command it answers:
//!
//! - [`Handles<C>`]: receives the command and the resumption of the invoker.
//!   The clause runs in the handler's home context and its reply is the
//!   answer of the handled computation.
//! - [`HandlesPlain<C>`]: answers the command in place, in the invoker's
//!   context. No resumption is created.
//! - [`HandlesAbort<C>`]: never resumes. The invoker's context is discarded
//!   before the clause runs and the clause produces the answer directly.
//!
//! [`Handler::clauses`] registers which of these forms answers each command.
//! The registration is turned into a table of type-erased clause functions
//! keyed by the command's [`TypeId`].

use std::any::{type_name, Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::runtime::context::{unbox, Outcome, Payload};
use crate::runtime::resumption::{Capture, Reply, Resumption};

/// An operation performed by a computation and answered by a handler
///
/// The command value travels to the handler; `Out` is what the invoker
/// receives back.
pub trait Command: Send + 'static {
    type Out: Send + 'static;
}

/// The return clause and clause registration of a handler
///
/// Clauses take `&self`: a handler instance may be reached again while one
/// of its clauses is suspended inside `resume`. Mutable state belongs behind
/// a lock in the handler's own fields.
pub trait Handler: Send + Sync + Sized + 'static {
    /// Result of the whole handled computation
    type Answer: Send + 'static;

    /// Result of the body the handler is installed around
    type Body: Send + 'static;

    /// Register the commands this handler answers
    fn clauses(clauses: &mut Clauses<Self>);

    /// Turn the body's result into the answer
    fn handle_return(&self, value: Self::Body) -> Self::Answer;
}

/// Clause for a command that receives the invoker's resumption
pub trait Handles<C: Command>: Handler {
    fn handle_command(&self, command: C, k: Resumption<C::Out, Self::Answer>)
        -> Reply<Self::Answer>;
}

/// Clause for a command answered in place, without a resumption
pub trait HandlesPlain<C: Command>: Handler {
    fn handle_plain(&self, command: C) -> C::Out;
}

/// Clause for a command that never resumes the invoker
pub trait HandlesAbort<C: Command>: Handler {
    fn handle_abort(&self, command: C) -> Self::Answer;
}

/* ===================== Clause table ===================== */

pub(crate) type ErasedHandler = Arc<dyn Any + Send + Sync>;

pub(crate) type SuspendFn = fn(ErasedHandler, Payload, Capture) -> Outcome;
pub(crate) type PlainFn = fn(&ErasedHandler, Payload) -> Payload;
pub(crate) type AbortFn = fn(ErasedHandler, Payload) -> Payload;

/// How a command is answered, with the clause already monomorphised
#[derive(Clone, Copy)]
pub(crate) enum ClauseKind {
    Suspend(SuspendFn),
    Plain(PlainFn),
    Abort(AbortFn),
}

impl std::fmt::Debug for ClauseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClauseKind::Suspend(_) => f.write_str("Suspend"),
            ClauseKind::Plain(_) => f.write_str("Plain"),
            ClauseKind::Abort(_) => f.write_str("Abort"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ClauseEntry {
    pub command: TypeId,
    pub command_name: &'static str,
    pub kind: ClauseKind,
}

/// Registration of the commands a handler answers
///
/// Registering the same command twice keeps the last registration.
pub struct Clauses<H> {
    entries: Vec<ClauseEntry>,
    _handler: PhantomData<fn() -> H>,
}

impl<H: Handler> Clauses<H> {
    pub(crate) fn new() -> Self {
        Clauses {
            entries: Vec::new(),
            _handler: PhantomData,
        }
    }

    /// Answer `C` with [`Handles::handle_command`]
    pub fn on<C: Command>(&mut self) -> &mut Self
    where
        H: Handles<C>,
    {
        self.register::<C>(ClauseKind::Suspend(suspend_clause::<H, C>))
    }

    /// Answer `C` in place with [`HandlesPlain::handle_plain`]
    pub fn plain<C: Command>(&mut self) -> &mut Self
    where
        H: HandlesPlain<C>,
    {
        self.register::<C>(ClauseKind::Plain(plain_clause::<H, C>))
    }

    /// Answer `C` with [`HandlesAbort::handle_abort`]
    pub fn abort<C: Command>(&mut self) -> &mut Self
    where
        H: HandlesAbort<C>,
    {
        self.register::<C>(ClauseKind::Abort(abort_clause::<H, C>))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn register<C: Command>(&mut self, kind: ClauseKind) -> &mut Self {
        let command = TypeId::of::<C>();
        self.entries.retain(|entry| entry.command != command);
        self.entries.push(ClauseEntry {
            command,
            command_name: type_name::<C>(),
            kind,
        });
        self
    }

    pub(crate) fn into_entries(self) -> Arc<[ClauseEntry]> {
        self.entries.into()
    }
}

/* ===================== Erased clauses ===================== */

fn handler_ref<H: Handler>(handler: &ErasedHandler) -> &H {
    match handler.downcast_ref::<H>() {
        Some(handler) => handler,
        None => crate::error::fatal(crate::error::EffectError::invariant(format!(
            "clause table entry does not belong to handler `{}`",
            type_name::<H>()
        ))),
    }
}

fn suspend_clause<H: Handles<C>, C: Command>(
    handler: ErasedHandler,
    payload: Payload,
    capture: Capture,
) -> Outcome {
    let handler = handler_ref::<H>(&handler);
    let command = unbox::<C>(payload);
    let k = Resumption::<C::Out, H::Answer>::captured(capture);

    match handler.handle_command(command, k) {
        Reply::Answer(answer) => Outcome::Answer(Box::new(answer)),
        Reply::Tail(tail) => Outcome::Tail(tail.into_transfer()),
    }
}

fn plain_clause<H: HandlesPlain<C>, C: Command>(handler: &ErasedHandler, payload: Payload) -> Payload {
    let handler = handler_ref::<H>(handler);
    Box::new(handler.handle_plain(unbox::<C>(payload)))
}

fn abort_clause<H: HandlesAbort<C>, C: Command>(handler: ErasedHandler, payload: Payload) -> Payload {
    let handler = handler_ref::<H>(&handler);
    Box::new(handler.handle_abort(unbox::<C>(payload)))
}

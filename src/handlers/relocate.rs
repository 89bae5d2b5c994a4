//! Handler relocation
//!
//! [`handle_swappable`] installs a handler so that the computation it
//! handles can later replace it with [`swap_handler`]. Two helper handlers
//! bracket the real one:
//!
//! ```text
//!   Aid<H>            answers SwapOut, re-installs everything
//!     H               the handler being swapped
//!       Abet<H>       answers SwapIn, captures the body
//!         body
//! ```
//!
//! `swap_handler` reaches `Abet`, which releases the body's resumption and
//! passes it outward together with the new handler. `Aid` throws away the
//! old installation and resumes the body under a fresh `Aid`, the new
//! handler, and the `Abet` still inside the resumption.

use std::convert::Infallible;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::handler::{Clauses, Command, Handler, Handles, HandlesAbort};
use crate::runtime::{handle, handle_with, invoke, Released, Reply, Resumption};

/// Sent by the body to its `Abet`
struct SwapIn<H> {
    handler: Arc<H>,
}

impl<H: Handler> Command for SwapIn<H> {
    type Out = ();
}

/// Sent by `Abet` to its `Aid`, carrying the body's resumption
struct SwapOut<H> {
    handler: Arc<H>,
    body: Released,
}

impl<H: Handler> Command for SwapOut<H> {
    type Out = Infallible;
}

struct Aid<H> {
    _handler: PhantomData<fn() -> H>,
}

impl<H> Aid<H> {
    fn new() -> Self {
        Aid {
            _handler: PhantomData,
        }
    }
}

impl<H: Handler> Handler for Aid<H> {
    type Answer = H::Answer;
    type Body = H::Answer;

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.abort::<SwapOut<H>>();
    }

    fn handle_return(&self, value: H::Answer) -> H::Answer {
        value
    }
}

impl<H: Handler> HandlesAbort<SwapOut<H>> for Aid<H> {
    fn handle_abort(&self, SwapOut { handler, body }: SwapOut<H>) -> H::Answer {
        tracing::debug!(handler = std::any::type_name::<H>(), "relocating computation");
        handle(Aid::<H>::new(), move || {
            handle_with(handler, move || {
                Resumption::<(), H::Body>::reconstitute(body).resume(())
            })
        })
    }
}

struct Abet<H> {
    _handler: PhantomData<fn() -> H>,
}

impl<H> Abet<H> {
    fn new() -> Self {
        Abet {
            _handler: PhantomData,
        }
    }
}

impl<H: Handler> Handler for Abet<H> {
    type Answer = H::Body;
    type Body = H::Body;

    fn clauses(clauses: &mut Clauses<Self>) {
        clauses.on::<SwapIn<H>>();
    }

    fn handle_return(&self, value: H::Body) -> H::Body {
        value
    }
}

impl<H: Handler> Handles<SwapIn<H>> for Abet<H> {
    fn handle_command(
        &self,
        SwapIn { handler }: SwapIn<H>,
        k: Resumption<(), H::Body>,
    ) -> Reply<H::Body> {
        match invoke(SwapOut {
            handler,
            body: k.release(),
        }) {}
    }
}

/// Run `body` under `handler` so that it can be replaced with [`swap_handler`]
pub fn handle_swappable<H, F>(handler: H, body: F) -> H::Answer
where
    H: Handler,
    F: FnOnce() -> H::Body + Send + 'static,
{
    let handler = Arc::new(handler);
    handle(Aid::<H>::new(), move || {
        handle_with(handler, move || handle(Abet::<H>::new(), body))
    })
}

/// Replace the innermost swappable `H` with `handler`
///
/// The computation continues where it left off; from now on its commands
/// reach the new handler.
pub fn swap_handler<H: Handler>(handler: H) {
    invoke(SwapIn {
        handler: Arc::new(handler),
    })
}

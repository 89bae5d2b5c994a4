//! # Resumptions
//!
//! A [`Resumption<Out, A>`] is the one-shot continuation of a suspended
//! command invocation: feeding it an `Out` continues the invoker, and the
//! handled computation eventually produces an `A`. It is consumed by value,
//! so resuming twice is rejected by the compiler:
//!
//! ```compile_fail
//! use effects_core::Resumption;
//!
//! let k = Resumption::<u32, u32>::from_fn(|x| x + 1);
//! let first = k.resume(1);
//! let second = k.resume(2);
//! ```
//!
//! A resumption that must outlive the clause that received it is turned into
//! a type-erased [`Released`] and later reconstituted at the same types.

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{mpsc, Arc};

use super::context::{self, unbox, Payload, Transfer, Wake};
use super::stack::Frame;
use super::Runtime;
use crate::error::{fatal, EffectError};

/* ===================== Capture ===================== */

/// The captured segment behind a suspended resumption
///
/// Holds the installations popped at dispatch, innermost last. The invoking
/// context sits in the parked slot of the last one.
pub(crate) struct Capture {
    runtime: Arc<Runtime>,
    frames: Vec<Frame>,
    consumed: bool,
}

impl Capture {
    pub fn new(runtime: Arc<Runtime>, frames: Vec<Frame>) -> Self {
        Capture {
            runtime,
            frames,
            consumed: false,
        }
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Take the segment out for re-entry
    pub fn take_frames(&mut self) -> Vec<Frame> {
        self.consumed = true;
        std::mem::take(&mut self.frames)
    }

    /// Unwind every context suspended in the segment, innermost first
    pub fn discard(mut self) {
        let frames = self.take_frames();
        tracing::debug!(
            runtime = self.runtime.id(),
            installations = frames.len(),
            "discarding resumption"
        );
        discard_frames(frames);
        self.runtime.resumption_discarded();
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        if !self.consumed {
            self.runtime.resumption_leaked(&self.frames);
        }
    }
}

/// Discard the contexts parked in `frames` and wait for each to finish
pub(crate) fn discard_frames(frames: Vec<Frame>) {
    for frame in frames.iter().rev() {
        let Some(parked) = &frame.parked else {
            continue;
        };
        let (ack_tx, ack_rx) = mpsc::channel();
        parked.send(Wake::Discard(ack_tx));
        if ack_rx.recv().is_err() {
            fatal(EffectError::invariant(format!(
                "context {} ended without acknowledging discard",
                parked.id()
            )));
        }
    }
}

/* ===================== Resumption ===================== */

enum Continuation {
    Suspended(Capture),
    Plain(Box<dyn FnOnce(Payload) -> Payload + Send>),
}

/// One-shot continuation taking an `Out` and producing the answer `A`
pub struct Resumption<Out, A> {
    cont: Continuation,
    _types: PhantomData<fn(Out) -> A>,
}

impl<Out: Send + 'static, A: Send + 'static> Resumption<Out, A> {
    pub(crate) fn captured(capture: Capture) -> Self {
        Resumption {
            cont: Continuation::Suspended(capture),
            _types: PhantomData,
        }
    }

    /// A resumption that runs `f` instead of a suspended computation
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce(Out) -> A + Send + 'static,
    {
        Resumption {
            cont: Continuation::Plain(Box::new(move |value| Box::new(f(unbox::<Out>(value))))),
            _types: PhantomData,
        }
    }

    /// Continue the suspended computation and wait for its answer
    pub fn resume(self, value: Out) -> A {
        match self.cont {
            Continuation::Suspended(capture) => {
                let (runtime, port) = context::current();
                runtime.enter(capture, Box::new(value), port.handle().clone());
                unbox::<A>(port.await_answer(&runtime))
            }
            Continuation::Plain(f) => unbox::<A>(f(Box::new(value))),
        }
    }

    /// Resume as the last act of a clause
    ///
    /// The clause's home context performs the resumption after the clause
    /// has returned, so a long chain of tail resumptions runs in constant
    /// native stack.
    pub fn tail_resume(self, value: Out) -> Reply<A> {
        match self.cont {
            Continuation::Suspended(capture) => Reply::Tail(TailResume {
                transfer: Transfer {
                    capture,
                    value: Box::new(value),
                },
                _answer: PhantomData,
            }),
            Continuation::Plain(f) => Reply::Answer(unbox::<A>(f(Box::new(value)))),
        }
    }

    /// Erase the types so the resumption can be stored
    pub fn release(self) -> Released {
        Released {
            inner: Box::new(self),
            out: type_name::<Out>(),
            answer: type_name::<A>(),
        }
    }

    /// Recover a released resumption
    ///
    /// Reconstituting at types other than the ones it was released at is fatal.
    pub fn reconstitute(released: Released) -> Self {
        match released.downcast::<Out, A>() {
            Ok(k) => k,
            Err(released) => fatal(EffectError::ResumptionTypeMismatch {
                stored_out: released.out,
                stored_answer: released.answer,
                requested_out: type_name::<Out>(),
                requested_answer: type_name::<A>(),
            }),
        }
    }
}

impl<Out, A> Resumption<Out, A> {
    /// Drop the resumption, unwinding the suspended computation
    pub fn discard(self) {
        match self.cont {
            Continuation::Suspended(capture) => capture.discard(),
            Continuation::Plain(_) => {}
        }
    }
}

impl<Out, A> fmt::Debug for Resumption<Out, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cont {
            Continuation::Suspended(capture) => f
                .debug_struct("Resumption")
                .field("runtime", &capture.runtime.id())
                .field("installations", &capture.frames.len())
                .finish(),
            Continuation::Plain(_) => f.write_str("Resumption(from_fn)"),
        }
    }
}

/* ===================== Released ===================== */

/// A type-erased, storable resumption
pub struct Released {
    inner: Box<dyn std::any::Any + Send>,
    out: &'static str,
    answer: &'static str,
}

impl Released {
    /// Recover the resumption, or get the handle back on a type mismatch
    pub fn downcast<Out: Send + 'static, A: Send + 'static>(
        self,
    ) -> Result<Resumption<Out, A>, Released> {
        let Released { inner, out, answer } = self;
        match inner.downcast::<Resumption<Out, A>>() {
            Ok(k) => Ok(*k),
            Err(inner) => Err(Released { inner, out, answer }),
        }
    }

    /// `(Out, Answer)` type names the resumption was released at
    pub fn type_names(&self) -> (&'static str, &'static str) {
        (self.out, self.answer)
    }
}

impl fmt::Debug for Released {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Released(Resumption<{}, {}>)", self.out, self.answer)
    }
}

/* ===================== Reply ===================== */

/// What a clause hands back to its home context
pub enum Reply<A> {
    /// The answer of the handled computation
    Answer(A),
    /// Continue by resuming in tail position
    Tail(TailResume<A>),
}

impl<A> From<A> for Reply<A> {
    fn from(answer: A) -> Self {
        Reply::Answer(answer)
    }
}

impl<A: fmt::Debug> fmt::Debug for Reply<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Answer(answer) => f.debug_tuple("Answer").field(answer).finish(),
            Reply::Tail(_) => f.write_str("Tail"),
        }
    }
}

/// A pending tail resumption, produced by [`Resumption::tail_resume`]
pub struct TailResume<A> {
    transfer: Transfer,
    _answer: PhantomData<fn() -> A>,
}

impl<A> TailResume<A> {
    pub(crate) fn into_transfer(self) -> Transfer {
        self.transfer
    }
}

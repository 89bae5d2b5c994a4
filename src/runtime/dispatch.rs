//! Command dispatch
//!
//! `invoke` finds the innermost installation answering the command and
//! runs its clause:
//!
//! - suspending clauses run in the installation's home context with the
//!   invoker captured in a resumption;
//! - plain clauses run right here, with the installation and everything
//!   above it lifted off the stack for the duration;
//! - abort clauses discard the invoker first, then answer in the home.

use std::any::{type_name, TypeId};
use std::sync::Arc;

use super::context::{self, unbox, Outcome, Payload, Wake};
use super::resumption::{discard_frames, Capture};
use super::stack::{Frame, Label};
use super::Runtime;
use crate::error::{fatal, EffectError};
use crate::handler::{AbortFn, ClauseKind, Command, ErasedHandler, PlainFn};

/// Invoke a command on the innermost handler that answers it
///
/// Panics with a fatal error when no active handler answers `C`.
pub fn invoke<C: Command>(command: C) -> C::Out {
    dispatch(None, command)
}

/// Invoke a command on the installation carrying `label`
///
/// Installations in between are skipped even if they answer `C`. Fatal when
/// no active installation carries the label or it does not answer `C`.
pub fn invoke_at<C: Command>(label: Label, command: C) -> C::Out {
    dispatch(Some(label), command)
}

fn dispatch<C: Command>(label: Option<Label>, command: C) -> C::Out {
    let (runtime, port) = context::current();
    let command_name = type_name::<C>();

    let mut stack = runtime.stack.lock();
    let (position, kind) = match stack.find(TypeId::of::<C>(), command_name, label) {
        Ok(found) => found,
        Err(err) => {
            drop(stack);
            fatal(err)
        }
    };
    let owner = stack.frame(position);
    tracing::debug!(
        command = command_name,
        installation = %owner.id,
        label = %owner.label,
        clause = ?kind,
        "dispatching command"
    );
    let handler = owner.handler.clone();
    let segment = stack.pop_until(position);
    drop(stack);
    runtime.command_dispatched();

    let payload: Payload = Box::new(command);
    match kind {
        ClauseKind::Plain(clause) => {
            unbox::<C::Out>(run_plain(&runtime, segment, &handler, clause, payload))
        }
        ClauseKind::Suspend(clause) => {
            let capture = suspend(&runtime, segment, port.handle().clone());
            send_job(&runtime, Box::new(move || clause(handler, payload, capture)));
            unbox::<C::Out>(port.await_value())
        }
        ClauseKind::Abort(clause) => {
            let capture = suspend(&runtime, segment, port.handle().clone());
            send_job(&runtime, Box::new(move || abort(clause, handler, payload, capture)));
            unbox::<C::Out>(port.await_value())
        }
    }
}

/// Record the invoker as suspended at the top of the segment
fn suspend(
    runtime: &Arc<Runtime>,
    mut segment: Vec<Frame>,
    invoker: context::ContextHandle,
) -> Capture {
    match segment.last_mut() {
        Some(top) if top.parked.is_none() => top.parked = Some(invoker),
        Some(top) => fatal(EffectError::invariant(format!(
            "installation {} already has a suspended context",
            top.id
        ))),
        None => fatal(EffectError::invariant("dispatch captured an empty segment")),
    }
    Capture::new(runtime.clone(), segment)
}

/// Wake the home context underneath the captured segment with a clause job
fn send_job(runtime: &Arc<Runtime>, job: context::Job) {
    let home = runtime.stack.lock().unpark_top();
    match home {
        Ok(home) => home.send(Wake::Run(job)),
        Err(err) => fatal(err),
    }
}

fn abort(clause: AbortFn, handler: ErasedHandler, payload: Payload, capture: Capture) -> Outcome {
    capture.discard();
    Outcome::Answer(clause(handler, payload))
}

/* ===================== Plain clauses ===================== */

/// Keeps a lifted segment and puts it back when the plain clause is done
struct Lifted<'a> {
    runtime: &'a Runtime,
    segment: Option<Vec<Frame>>,
}

impl Drop for Lifted<'_> {
    fn drop(&mut self) {
        let Some(mut segment) = self.segment.take() else {
            return;
        };

        // A discarded invoker takes the lifted contexts down with it.
        if std::thread::panicking() && context::is_discarding() {
            discard_frames(segment);
            return;
        }

        let mut stack = self.runtime.stack.lock();
        let home = segment.last_mut().and_then(|top| top.parked.take());
        let slot = stack.top_slot();
        if slot.is_some() {
            drop(stack);
            fatal(EffectError::invariant("slot below a lifted segment was reoccupied"));
        }
        *slot = home;
        stack.push_segment(segment);
    }
}

fn run_plain(
    runtime: &Arc<Runtime>,
    mut segment: Vec<Frame>,
    handler: &ErasedHandler,
    clause: PlainFn,
    payload: Payload,
) -> Payload {
    // The home below the segment moves into the segment's top slot, leaving
    // the invoker as the running context directly above the remaining stack.
    let home = runtime.stack.lock().top_slot().take();
    if let Some(top) = segment.last_mut() {
        top.parked = home;
    }

    let lifted = Lifted {
        runtime,
        segment: Some(segment),
    };
    let out = clause(handler, payload);
    drop(lifted);
    out
}

//! # Effect runtime
//!
//! One runtime exists per root thread. It owns the handler stack shared by
//! every execution context spawned on behalf of that thread, and counts
//! what happens to it.
//!
//! ## Control transfer
//!
//! 1. `handle` parks the calling context under a new installation and runs
//!    the body in a fresh context.
//! 2. `invoke` lifts the matching installation and everything above it off
//!    the stack into a resumption and wakes the installation's home.
//! 3. `resume` puts the segment back, parks the resumer under it and wakes
//!    the suspended invoker.
//! 4. When a body finishes, its installation is popped and the answer goes
//!    to whichever context is parked underneath.

pub mod context;
pub mod dispatch;
pub mod resumption;
pub mod stack;

#[cfg(test)]
mod tests;

use std::any::{type_name, Any};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use self::context::{unbox, ContextHandle, Delivery, Payload, Port, Wake};
use self::resumption::Capture;
use self::stack::{Frame, HandlerStack, InstallationId, Label};
use crate::config::Config;
use crate::error::{fatal, EffectError};
use crate::handler::Handler;

pub use self::context::ContextId;
pub use self::dispatch::{invoke, invoke_at};
pub use self::resumption::{Released, Reply, Resumption, TailResume};

static NEXT_RUNTIME: AtomicU64 = AtomicU64::new(1);
static NEXT_INSTALLATION: AtomicU64 = AtomicU64::new(1);

/* ===================== Runtime ===================== */

/// State shared by all contexts of one root thread
pub(crate) struct Runtime {
    id: u64,
    config: Config,
    pub(crate) stack: Mutex<HandlerStack>,
    counters: Counters,
}

#[derive(Default)]
struct Counters {
    installations: AtomicU64,
    commands_dispatched: AtomicU64,
    resumptions: AtomicU64,
    resumptions_discarded: AtomicU64,
    resumptions_leaked: AtomicU64,
    contexts_spawned: AtomicU64,
    contexts_finished: AtomicU64,
}

/// Snapshot of a runtime's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeStats {
    pub runtime: u64,
    pub installations: u64,
    pub commands_dispatched: u64,
    pub resumptions: u64,
    pub resumptions_discarded: u64,
    pub resumptions_leaked: u64,
    pub contexts_spawned: u64,
    pub contexts_live: u64,
    pub stack_depth: usize,
    pub max_stack_depth: usize,
}

impl Runtime {
    pub fn new(config: Config) -> Self {
        Runtime {
            id: NEXT_RUNTIME.fetch_add(1, Ordering::Relaxed),
            config,
            stack: Mutex::new(HandlerStack::new()),
            counters: Counters::default(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> RuntimeStats {
        let c = &self.counters;
        let spawned = c.contexts_spawned.load(Ordering::Acquire);
        let finished = c.contexts_finished.load(Ordering::Acquire);
        let stack = self.stack.lock();

        RuntimeStats {
            runtime: self.id,
            installations: c.installations.load(Ordering::Relaxed),
            commands_dispatched: c.commands_dispatched.load(Ordering::Relaxed),
            resumptions: c.resumptions.load(Ordering::Relaxed),
            resumptions_discarded: c.resumptions_discarded.load(Ordering::Relaxed),
            resumptions_leaked: c.resumptions_leaked.load(Ordering::Relaxed),
            contexts_spawned: spawned,
            contexts_live: spawned.saturating_sub(finished),
            stack_depth: stack.depth(),
            max_stack_depth: stack.high_water(),
        }
    }

    /* ===================== Counters ===================== */

    pub(crate) fn command_dispatched(&self) {
        self.counters.commands_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn context_spawned(&self) {
        self.counters.contexts_spawned.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn context_finished(&self) {
        self.counters.contexts_finished.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn resumption_discarded(&self) {
        self.counters.resumptions_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn resumption_leaked(&self, frames: &[Frame]) {
        self.counters.resumptions_leaked.fetch_add(1, Ordering::Relaxed);
        if self.config.diagnostics.warn_on_leak {
            let installations: Vec<String> = frames.iter().map(|f| f.id.to_string()).collect();
            tracing::warn!(
                runtime = self.id,
                installations = ?installations,
                "resumption dropped without being resumed, its context stays suspended"
            );
        }
    }

    /* ===================== Installation ===================== */

    /// Run `body` under `handler` and wait for the answer
    fn install<H, F>(
        self: &Arc<Self>,
        port: &Port,
        label: Label,
        handler: Arc<H>,
        body: F,
    ) -> Payload
    where
        H: Handler,
        F: FnOnce() -> H::Body + Send + 'static,
    {
        let id = InstallationId(NEXT_INSTALLATION.fetch_add(1, Ordering::Relaxed));
        let frame = Frame::new(id, label, handler.clone());
        {
            let mut stack = self.stack.lock();
            if let Err(err) = stack.park_top(port.handle().clone()) {
                drop(stack);
                fatal(err);
            }
            stack.push(frame);
        }
        self.counters.installations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            runtime = self.id,
            installation = %id,
            label = %label,
            handler = type_name::<H>(),
            "handler installed"
        );

        let runtime = self.clone();
        let entry = move || {
            let value = body();
            runtime.finish(id, &*handler, value)
        };

        if let Err(err) = context::spawn(self, id, entry) {
            let mut stack = self.stack.lock();
            let _ = stack.pop(id);
            let _ = stack.unpark_top();
            drop(stack);
            fatal(err);
        }

        // The body context runs from here on, with this one parked below it.
        port.await_answer(self)
    }

    /// Run the return clause and hand the answer to the context parked below
    fn finish<H: Handler>(&self, id: InstallationId, handler: &H, value: H::Body) -> Delivery {
        if let Err(err) = self.stack.lock().shadow(id) {
            fatal(err);
        }

        let answer = handler.handle_return(value);

        let mut stack = self.stack.lock();
        let popped = match stack.pop(id) {
            Ok(frame) => stack.unpark_top().map(|target| (frame, target)),
            Err(err) => Err(err),
        };
        drop(stack);
        match popped {
            Ok((_frame, target)) => {
                tracing::debug!(runtime = self.id, installation = %id, "handler returned");
                (target, Wake::Answer(Box::new(answer)))
            }
            Err(err) => fatal(err),
        }
    }

    /* ===================== Resumption ===================== */

    /// Put a captured segment back on the stack and wake its invoker
    ///
    /// `here` is parked underneath the segment and receives the answer.
    pub(crate) fn enter(
        self: &Arc<Self>,
        mut capture: Capture,
        value: Payload,
        here: ContextHandle,
    ) {
        if !Arc::ptr_eq(capture.runtime(), self) {
            fatal(EffectError::ForeignResumption {
                captured: capture.runtime().id(),
                current: self.id,
            });
        }

        let mut frames = capture.take_frames();
        let target = match frames.last_mut().and_then(|top| top.parked.take()) {
            Some(target) => target,
            None => fatal(EffectError::invariant("resumption has no suspended context")),
        };

        {
            let mut stack = self.stack.lock();
            if let Err(err) = stack.park_top(here) {
                drop(stack);
                fatal(err);
            }
            stack.push_segment(frames);
        }
        self.counters.resumptions.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(runtime = self.id, context = %target.id(), "resuming");
        target.send(Wake::Value(value));
    }

    /// Deliver a panic that escaped a context to the context waiting on `owner`
    pub(crate) fn forward_panic(&self, owner: InstallationId, payload: Box<dyn Any + Send>) {
        let mut stack = self.stack.lock();
        let Some(position) = stack.position(owner) else {
            drop(stack);
            tracing::error!(
                runtime = self.id,
                installation = %owner,
                "panic escaped a context whose installation is gone"
            );
            std::process::abort();
        };
        let unwound = stack.pop_until(position);
        let home = stack.unpark_top();
        drop(stack);
        drop(unwound);
        self.context_finished();

        match home {
            Ok(home) => {
                tracing::debug!(runtime = self.id, installation = %owner, "forwarding panic");
                home.send(Wake::Panic(payload));
            }
            Err(err) => {
                tracing::error!(runtime = self.id, error = %err, "cannot forward panic");
                std::process::abort();
            }
        }
    }
}

/* ===================== Public API ===================== */

/// Run `body` under a fresh installation of `handler`
pub fn handle<H, F>(handler: H, body: F) -> H::Answer
where
    H: Handler,
    F: FnOnce() -> H::Body + Send + 'static,
{
    handle_labelled_with(Label::fresh(), Arc::new(handler), body)
}

/// Run `body` under a shared handler instance
pub fn handle_with<H, F>(handler: Arc<H>, body: F) -> H::Answer
where
    H: Handler,
    F: FnOnce() -> H::Body + Send + 'static,
{
    handle_labelled_with(Label::fresh(), handler, body)
}

/// Run `body` under `handler`, reachable through [`invoke_at`] with `label`
pub fn handle_labelled<H, F>(label: Label, handler: H, body: F) -> H::Answer
where
    H: Handler,
    F: FnOnce() -> H::Body + Send + 'static,
{
    handle_labelled_with(label, Arc::new(handler), body)
}

pub fn handle_labelled_with<H, F>(label: Label, handler: Arc<H>, body: F) -> H::Answer
where
    H: Handler,
    F: FnOnce() -> H::Body + Send + 'static,
{
    let (runtime, port) = context::current();
    let answer = runtime.install(&port, label, handler, body);
    unbox::<H::Answer>(answer)
}

/// Counters of the runtime owning the calling thread
pub fn stats() -> RuntimeStats {
    match context::current_runtime() {
        Some(runtime) => runtime.stats(),
        None => RuntimeStats::default(),
    }
}

//! # Execution contexts
//!
//! Every handled body runs in its own execution context: a native thread
//! with its own stack and an inbox. Exactly one context of a runtime runs
//! at any instant. A context hands control to another by sending it a
//! [`Wake`] and then blocking on its own inbox, so suspending never unwinds
//! the native stack of the suspended computation.
//!
//! The thread that first touches the runtime is the root context. It is not
//! spawned by the runtime and can never be discarded.

use std::any::{type_name, Any};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use super::resumption::Capture;
use super::stack::InstallationId;
use super::Runtime;
use crate::error::{fatal, EffectError};

/// A value crossing a context boundary
pub(crate) type Payload = Box<dyn Any + Send>;

/// A clause invocation to run in a handler's home context
pub(crate) type Job = Box<dyn FnOnce() -> Outcome + Send>;

/// What a context sends when its entry function finishes
pub(crate) type Delivery = (ContextHandle, Wake);

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: RefCell<Option<(Arc<Runtime>, Rc<Port>)>> = const { RefCell::new(None) };
    static DISCARDING: Cell<bool> = const { Cell::new(false) };
}

/* ===================== Messages ===================== */

/// Messages that wake a blocked context
pub(crate) enum Wake {
    /// Run a clause in this context
    Run(Job),
    /// Result of the command this context invoked
    Value(Payload),
    /// Answer of the computation this context installed or resumed
    Answer(Payload),
    /// A panic escaped the computation this context was waiting on
    Panic(Box<dyn Any + Send>),
    /// Unwind this context and acknowledge
    Discard(Sender<()>),
}

impl fmt::Debug for Wake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Wake::Run(_) => "Run",
            Wake::Value(_) => "Value",
            Wake::Answer(_) => "Answer",
            Wake::Panic(_) => "Panic",
            Wake::Discard(_) => "Discard",
        };
        f.write_str(name)
    }
}

/// How a clause finished in its home context
pub(crate) enum Outcome {
    /// The clause produced the answer
    Answer(Payload),
    /// The clause ended by resuming a resumption in tail position
    Tail(Transfer),
}

/// A resumption to perform in place of a finished clause
pub(crate) struct Transfer {
    pub capture: Capture,
    pub value: Payload,
}

/// Unwind payload for a context being discarded
pub(crate) struct ContextDiscarded {
    ack: Sender<()>,
}

/* ===================== Handles ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        ContextId(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Address of a context's inbox
#[derive(Clone)]
pub(crate) struct ContextHandle {
    id: ContextId,
    tx: Sender<Wake>,
}

impl ContextHandle {
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Wake the context. The receiving side lives as long as the context.
    pub fn send(&self, wake: Wake) {
        if self.tx.send(wake).is_err() {
            fatal(EffectError::invariant(format!(
                "context {} has already terminated",
                self.id
            )));
        }
    }
}

#[cfg(test)]
impl ContextHandle {
    /// A handle whose context never runs
    pub(crate) fn detached() -> Self {
        let (tx, _inbox) = mpsc::channel();
        ContextHandle {
            id: ContextId::next(),
            tx,
        }
    }
}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextHandle({})", self.id)
    }
}

/// The receiving end of the running context
///
/// The port keeps a sender to its own inbox, so a context whose every other
/// handle was dropped stays blocked instead of observing a disconnect.
pub(crate) struct Port {
    handle: ContextHandle,
    inbox: Receiver<Wake>,
    root: bool,
}

impl Port {
    fn new(root: bool) -> Self {
        let (tx, inbox) = mpsc::channel();
        Port {
            handle: ContextHandle {
                id: ContextId::next(),
                tx,
            },
            inbox,
            root,
        }
    }

    pub fn handle(&self) -> &ContextHandle {
        &self.handle
    }

    fn recv(&self) -> Wake {
        match self.inbox.recv() {
            Ok(wake) => wake,
            Err(_) => fatal(EffectError::invariant(format!(
                "inbox of context {} disconnected",
                self.handle.id
            ))),
        }
    }

    /// Block until the answer of an installed or resumed computation arrives
    ///
    /// Clause jobs for handlers whose home is this context run here in the
    /// meantime. A clause that ends in a tail resumption hands its transfer
    /// back to this loop, so chains of tail resumptions do not grow the stack.
    pub fn await_answer(&self, runtime: &Arc<Runtime>) -> Payload {
        loop {
            match self.recv() {
                Wake::Answer(answer) => return answer,
                Wake::Run(job) => match job() {
                    Outcome::Answer(answer) => return answer,
                    Outcome::Tail(Transfer { capture, value }) => {
                        runtime.enter(capture, value, self.handle.clone());
                    }
                },
                Wake::Panic(payload) => panic::resume_unwind(payload),
                Wake::Discard(ack) => self.discarded(ack),
                Wake::Value(_) => fatal(EffectError::invariant(format!(
                    "command result delivered to {} while it awaits an answer",
                    self.handle.id
                ))),
            }
        }
    }

    /// Block until the result of an invoked command arrives
    pub fn await_value(&self) -> Payload {
        match self.recv() {
            Wake::Value(value) => value,
            Wake::Discard(ack) => self.discarded(ack),
            other => fatal(EffectError::invariant(format!(
                "{:?} delivered to {} while it awaits a command result",
                other, self.handle.id
            ))),
        }
    }

    fn discarded(&self, ack: Sender<()>) -> ! {
        if self.root {
            fatal(EffectError::invariant("the root context cannot be discarded"));
        }
        tracing::trace!(context = %self.handle.id, "context discarded");
        DISCARDING.with(|flag| flag.set(true));
        panic::resume_unwind(Box::new(ContextDiscarded { ack }))
    }
}

/// Whether the running context is unwinding because it was discarded
pub(crate) fn is_discarding() -> bool {
    DISCARDING.with(|flag| flag.get())
}

/* ===================== Current context ===================== */

/// The runtime and port of the running context
///
/// A thread outside any runtime becomes the root context of a new runtime.
pub(crate) fn current() -> (Arc<Runtime>, Rc<Port>) {
    CURRENT.with(|current| {
        let mut current = current.borrow_mut();
        let (runtime, port) = current.get_or_insert_with(|| {
            let runtime = Arc::new(Runtime::new(crate::init::current_config()));
            tracing::debug!(runtime = runtime.id(), "runtime created");
            (runtime, Rc::new(Port::new(true)))
        });
        (runtime.clone(), port.clone())
    })
}

/// The runtime of the running context, if one was created on this thread
pub(crate) fn current_runtime() -> Option<Arc<Runtime>> {
    CURRENT.with(|current| current.borrow().as_ref().map(|(rt, _)| rt.clone()))
}

/* ===================== Spawning ===================== */

/// Start a context running `entry` on behalf of installation `owner`
///
/// When `entry` returns, its delivery is sent and the context ends. A panic
/// escaping `entry` is forwarded to the context waiting on `owner`.
pub(crate) fn spawn<F>(
    runtime: &Arc<Runtime>,
    owner: InstallationId,
    entry: F,
) -> Result<ContextHandle, EffectError>
where
    F: FnOnce() -> Delivery + Send + 'static,
{
    let config = &runtime.config().context;
    let (tx, inbox) = mpsc::channel();
    let handle = ContextHandle {
        id: ContextId::next(),
        tx,
    };
    let port = Port {
        handle: handle.clone(),
        inbox,
        root: false,
    };
    let rt = runtime.clone();

    runtime.context_spawned();
    thread::Builder::new()
        .name(format!("{}-{}", config.thread_name_prefix, handle.id.0))
        .stack_size(config.stack_size)
        .spawn(move || run_context(rt, port, owner, entry))
        .map_err(|source| {
            runtime.context_finished();
            EffectError::ContextSpawn {
                installation: owner,
                source,
            }
        })?;

    tracing::trace!(context = %handle.id, installation = %owner, "context spawned");
    Ok(handle)
}

fn run_context<F>(runtime: Arc<Runtime>, port: Port, owner: InstallationId, entry: F)
where
    F: FnOnce() -> Delivery,
{
    let id = port.handle.id;
    CURRENT.with(|current| {
        *current.borrow_mut() = Some((runtime.clone(), Rc::new(port)));
    });

    match panic::catch_unwind(AssertUnwindSafe(entry)) {
        Ok((target, wake)) => {
            runtime.context_finished();
            tracing::trace!(context = %id, to = %target.id(), "context finished");
            target.send(wake);
        }
        Err(payload) => match payload.downcast::<ContextDiscarded>() {
            Ok(discarded) => {
                runtime.context_finished();
                // The discarding side may itself be unwinding; a closed ack is fine.
                discarded.ack.send(()).ok();
            }
            Err(payload) => runtime.forward_panic(owner, payload),
        },
    }

    CURRENT.with(|current| current.borrow_mut().take());
}

/// Unwrap a payload whose type the protocol guarantees
pub(crate) fn unbox<T: 'static>(payload: Payload) -> T {
    match payload.downcast::<T>() {
        Ok(value) => *value,
        Err(_) => fatal(EffectError::invariant(format!(
            "payload is not a `{}`",
            type_name::<T>()
        ))),
    }
}

//! One-shot algebraic effect handlers
//!
//! A computation invokes commands; the innermost enclosing handler that
//! answers a command receives it together with a [`Resumption`] of the
//! invoker, which it may resume once, later, elsewhere, or not at all.
//!
//! ```
//! use effects_core::handlers::state::{get, put, State};
//! use effects_core::handle;
//!
//! let answer = handle(State::<i32, i32>::new(10), || {
//!     put(get::<i32>() + 1);
//!     get::<i32>() * 2
//! });
//! assert_eq!(answer, 22);
//! ```

pub mod benchmark;
pub mod cli;
pub mod config;
pub mod demos;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod init;
pub mod runtime;
pub mod store;

pub use error::EffectError;
pub use handler::{Clauses, Command, Handler, Handles, HandlesAbort, HandlesPlain};
pub use runtime::stack::{InstallationId, Label};
pub use runtime::{
    handle, handle_labelled, handle_labelled_with, handle_with, invoke, invoke_at, stats,
    Released, Reply, Resumption, RuntimeStats, TailResume,
};
pub use store::{ResumptionSlot, ResumptionTable};

// Re-export init API for convenience
pub use init::{initialize, InitBuilder, InitOptions};

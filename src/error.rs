//! Runtime error types
//!
//! Every condition in this module is a programming error rather than a
//! recoverable failure: the runtime logs it and raises it with [`fatal`].
//! Recoverable failure is a property of user handlers, not of the core.

use thiserror::Error;

use crate::runtime::stack::{InstallationId, Label};

/// Errors raised by the effect runtime
#[derive(Debug, Error)]
pub enum EffectError {
    /// A command was invoked with nothing installed to answer it
    #[error("no handler for command `{command}`")]
    NoHandler { command: &'static str },

    /// `invoke_at` named a label that no active installation carries
    #[error("no handler labelled {label} for command `{command}`")]
    LabelNotFound { label: Label, command: &'static str },

    /// `invoke_at` reached an installation that does not answer the command
    #[error("handler `{handler}` labelled {label} does not answer command `{command}`")]
    LabelMismatch {
        label: Label,
        handler: &'static str,
        command: &'static str,
    },

    /// A released resumption was reconstituted at the wrong types
    #[error(
        "resumption type mismatch: released as `Resumption<{stored_out}, {stored_answer}>`, \
         reconstituted as `Resumption<{requested_out}, {requested_answer}>`"
    )]
    ResumptionTypeMismatch {
        stored_out: &'static str,
        stored_answer: &'static str,
        requested_out: &'static str,
        requested_answer: &'static str,
    },

    /// A resumption was resumed from a thread outside the runtime that captured it
    #[error("resumption belongs to runtime {captured}, resumed from runtime {current}")]
    ForeignResumption { captured: u64, current: u64 },

    /// The OS refused to create a new execution context
    #[error("failed to spawn execution context for installation {installation}")]
    ContextSpawn {
        installation: InstallationId,
        #[source]
        source: std::io::Error,
    },

    /// The handler stack or a context protocol reached an impossible state
    #[error("effect runtime invariant violated: {0}")]
    Invariant(String),
}

impl EffectError {
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        EffectError::Invariant(message.into())
    }
}

/// Log a fatal runtime error and raise it as a panic
///
/// Panics escaping an execution context are forwarded to the context waiting
/// on it, so a fatal error surfaces from the outermost `handle` or `resume`
/// call on the thread that owns the runtime.
#[track_caller]
pub fn fatal(err: EffectError) -> ! {
    tracing::error!(error = %err, "fatal effect runtime error");
    panic!("{}", err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_handler_message_names_command() {
        let err = EffectError::NoHandler { command: "demo::Get" };
        assert_eq!(err.to_string(), "no handler for command `demo::Get`");
    }

    #[test]
    fn test_type_mismatch_message_lists_both_shapes() {
        let err = EffectError::ResumptionTypeMismatch {
            stored_out: "i32",
            stored_answer: "()",
            requested_out: "u8",
            requested_answer: "()",
        };
        let msg = err.to_string();
        assert!(msg.starts_with("resumption type mismatch"));
        assert!(msg.contains("Resumption<i32, ()>"));
        assert!(msg.contains("Resumption<u8, ()>"));
    }

    #[test]
    #[should_panic(expected = "effect runtime invariant violated: broken")]
    fn test_fatal_panics_with_message() {
        fatal(EffectError::invariant("broken"));
    }
}

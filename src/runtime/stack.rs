//! Handler stack
//!
//! The stack holds the active handler installations, innermost last. Every
//! installation also owns a parked slot: the context that is suspended while
//! the installations above it run. That context is the "home" of the next
//! installation up, and it is where that installation's clauses execute.
//! The slot below the first installation is the base slot.
//!
//! ```text
//!   base      [F1]       [F2]       [F3]
//!   home(F1)  home(F2)   home(F3)   (active: F3's body, slot empty)
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::context::ContextHandle;
use crate::error::EffectError;
use crate::handler::{ClauseEntry, ClauseKind, Clauses, Handler};

static FRESH_LABELS: AtomicI64 = AtomicI64::new(0);

/* ===================== Identifiers ===================== */

/// Identifies one installation for its whole lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstallationId(pub(crate) u64);

impl fmt::Display for InstallationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Names an installation so commands can target it directly
///
/// User labels are positive. [`Label::fresh`] hands out negative labels that
/// never collide with user labels or with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(i64);

impl Label {
    /// A user-chosen label
    pub fn new(value: u32) -> Self {
        Label(i64::from(value) + 1)
    }

    /// A process-wide unique label
    pub fn fresh() -> Self {
        Label(FRESH_LABELS.fetch_sub(1, Ordering::Relaxed) - 1)
    }

    pub fn is_fresh(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "fresh#{}", -self.0)
        } else {
            write!(f, "#{}", self.0 - 1)
        }
    }
}

/* ===================== Frames ===================== */

/// One handler installation
pub(crate) struct Frame {
    pub id: InstallationId,
    pub label: Label,
    /// Set while the return clause runs, so the handler cannot answer its own commands
    pub shadowed: bool,
    pub handler: Arc<dyn Any + Send + Sync>,
    pub handler_name: &'static str,
    pub clauses: Arc<[ClauseEntry]>,
    /// Context suspended underneath the next installation up
    pub parked: Option<ContextHandle>,
}

impl Frame {
    pub fn new<H: Handler>(id: InstallationId, label: Label, handler: Arc<H>) -> Self {
        let mut clauses = Clauses::<H>::new();
        H::clauses(&mut clauses);

        Frame {
            id,
            label,
            shadowed: false,
            handler,
            handler_name: std::any::type_name::<H>(),
            clauses: clauses.into_entries(),
            parked: None,
        }
    }

    fn clause_for(&self, command: TypeId) -> Option<ClauseKind> {
        self.clauses
            .iter()
            .find(|entry| entry.command == command)
            .map(|entry| entry.kind)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("handler", &self.handler_name)
            .field("shadowed", &self.shadowed)
            .field("parked", &self.parked.as_ref().map(|c| c.id()))
            .finish()
    }
}

/* ===================== Stack ===================== */

/// The dynamically scoped stack of active installations
#[derive(Debug, Default)]
pub(crate) struct HandlerStack {
    base: Option<ContextHandle>,
    frames: Vec<Frame>,
    high_water: usize,
}

impl HandlerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Deepest the stack has been since the runtime started
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
        self.high_water = self.high_water.max(self.frames.len());
    }

    /// Pop the top installation, which must be `expected`
    pub fn pop(&mut self, expected: InstallationId) -> Result<Frame, EffectError> {
        match self.frames.pop() {
            Some(top) if top.id == expected => Ok(top),
            Some(top) => {
                let found = top.id;
                self.frames.push(top);
                Err(EffectError::invariant(format!(
                    "pop of {} out of order, top of stack is {}",
                    expected, found
                )))
            }
            None => Err(EffectError::invariant(format!(
                "pop of {} from an empty handler stack",
                expected
            ))),
        }
    }

    /// Find the innermost installation answering `command`
    ///
    /// With a label, only the installation carrying that label is considered.
    /// Shadowed installations are skipped either way.
    pub fn find(
        &self,
        command: TypeId,
        command_name: &'static str,
        label: Option<Label>,
    ) -> Result<(usize, ClauseKind), EffectError> {
        let mut active = self
            .frames
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, frame)| !frame.shadowed);

        match label {
            None => {
                for (position, frame) in active {
                    if let Some(kind) = frame.clause_for(command) {
                        return Ok((position, kind));
                    }
                }
                Err(EffectError::NoHandler {
                    command: command_name,
                })
            }
            Some(label) => {
                let Some((position, frame)) = active.find(|(_, f)| f.label == label)
                else {
                    return Err(EffectError::LabelNotFound {
                        label,
                        command: command_name,
                    });
                };
                match frame.clause_for(command) {
                    Some(kind) => Ok((position, kind)),
                    None => Err(EffectError::LabelMismatch {
                        label,
                        handler: frame.handler_name,
                        command: command_name,
                    }),
                }
            }
        }
    }

    pub fn position(&self, id: InstallationId) -> Option<usize> {
        self.frames.iter().rposition(|frame| frame.id == id)
    }

    pub fn frame(&self, position: usize) -> &Frame {
        &self.frames[position]
    }

    /// Remove every installation from `position` to the top, in stack order
    pub fn pop_until(&mut self, position: usize) -> Vec<Frame> {
        self.frames.split_off(position)
    }

    /// Re-push a segment previously removed with [`HandlerStack::pop_until`]
    pub fn push_segment(&mut self, segment: Vec<Frame>) {
        self.frames.extend(segment);
        self.high_water = self.high_water.max(self.frames.len());
    }

    /// Mark an installation as running its return clause
    pub fn shadow(&mut self, id: InstallationId) -> Result<(), EffectError> {
        match self.frames.iter_mut().rev().find(|frame| frame.id == id) {
            Some(frame) => {
                frame.shadowed = true;
                Ok(())
            }
            None => Err(EffectError::invariant(format!(
                "installation {} is not on the handler stack",
                id
            ))),
        }
    }

    /// The parked slot of the top installation, or the base slot
    pub fn top_slot(&mut self) -> &mut Option<ContextHandle> {
        match self.frames.last_mut() {
            Some(frame) => &mut frame.parked,
            None => &mut self.base,
        }
    }

    /// Suspend `context` underneath whatever is pushed next
    pub fn park_top(&mut self, context: ContextHandle) -> Result<(), EffectError> {
        let slot = self.top_slot();
        if let Some(occupant) = slot {
            return Err(EffectError::invariant(format!(
                "cannot park {}, slot already holds {}",
                context.id(),
                occupant.id()
            )));
        }
        *slot = Some(context);
        Ok(())
    }

    /// Take the context waiting underneath the top of the stack
    pub fn unpark_top(&mut self) -> Result<ContextHandle, EffectError> {
        self.top_slot()
            .take()
            .ok_or_else(|| EffectError::invariant("no context parked underneath the top installation"))
    }
}

//! Ready-made handlers built on the public runtime surface
//!
//! - [`exception`]: raising and catching with abort clauses
//! - [`state`]: mutable state through `get`/`put`
//! - [`reader`]: an immutable environment value
//! - [`generator`]: iterators driven by a suspended computation
//! - [`relocate`]: swapping the handler underneath a running computation

pub mod exception;
pub mod generator;
pub mod reader;
pub mod relocate;
pub mod state;

#[cfg(test)]
mod tests;

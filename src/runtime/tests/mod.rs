//! Tests for the effect runtime
//!
//! Organized by feature area

mod discard_tests;
mod helpers;
mod panic_tests;
mod property_tests;

//! Tests for the ready-made handlers

mod exception_tests;
mod state_tests;

//! Flow Smoke - end-to-end smoke tests for a containerized flow engine
//!
//! This library provisions an engine container, deploys a flow definition
//! into it, posts a test event and checks that a counter increased.

pub mod cli;
pub mod common;
pub mod container;
pub mod engine;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Config, Error, Result};
pub use testing::{RunReport, SmokeTest};

//! Smoke test runner
//!
//! Drives one end-to-end run against a provisioned engine and reports the
//! verdict as structured data rather than only as printed text.

mod report;
mod runner;

pub use report::*;
pub use runner::SmokeTest;

//! Shared test utilities for deeptalent integration tests.
//!
//! - `harness`: an isolated database, blob directory and task scheduler
//! - `builders`: résumé files and scripted completion replies

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;

//! # Dialer Testing Utils
//!
//! Shared testing utilities for the outbound dialer engine.
//! This crate provides test data builders and executor test doubles
//! that can be used across all other crates in the workspace.
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! dialer-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod mocks;

// Re-export commonly used items
pub use builders::*;
pub use mocks::*;

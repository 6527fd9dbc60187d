#![deny(unsafe_code)]

//! Shared test utilities for the podhost workspace.
//!
//! Provides config builders, a recording backend, a temp-rooted runtime
//! fixture, and tracing helpers so that individual crate tests stay concise.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! podhost-test-utils = { workspace = true }
//! ```

pub mod backend;
pub mod config;
pub mod runtime;
pub mod tracing_setup;

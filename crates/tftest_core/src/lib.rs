//! Shared, pure vocabulary for the `tftest` orchestrator.
//!
//! This crate is intentionally small and dependency-light. It holds the names and values that both the
//! orchestrator and the test binaries it launches have to agree on:
//! - the environment variables exchanged with child processes ([`env`]),
//! - the built-in list of mock-able service endpoints ([`services`]),
//! - the files the orchestrator generates and the infra tool leaves behind ([`artifacts`]),
//! - the renderer for the generated provider file ([`provider`]).
//!
//! ## Notes
//!
//! - **No IO**, no async runtime, no global state. Writing the rendered provider to disk is the orchestrator's job.

pub mod artifacts;
pub mod env;
pub mod provider;
pub mod services;

pub use provider::render_provider;
pub use services::DEFAULT_SERVICES;

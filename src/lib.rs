#![forbid(unsafe_code)]
//! tftest: a parallel integration-test orchestrator for Terraform modules.
//!
//! Every directory under the root that holds a test file becomes a job. Each job gets its own moto mock service on
//! a free loopback port, a generated `provider.tf` pointing every AWS endpoint at that mock, a `terraform init` +
//! `apply`, and finally a run of its test file against the live mock state. Jobs run concurrently behind a
//! CPU-sized admission gate, everything they started is torn down afterwards, and a pass/fail table is printed.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` and `orchestrator`
//!   modules enforce `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Child processes**: a failing child is data (a job's terminal error), never a panic in the orchestrator.

pub mod cli;
pub mod config;
pub mod orchestrator;

pub use config::{CleanupConfig, NormalizedConfig, ProbeConfig, RunConfig, Toolchain};
pub use orchestrator::{Orchestrator, RunReport};

//! CLI module for tftest
//!
//! ## Commands
//!
//! - `run [DIR]` - Run every job under DIR and print the results table
//! - `list [DIR]` - Show the jobs that would run, without starting anything
//! - `services` - Print the built-in list of mocked service endpoints
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::{self, ProbeConfig, RunConfig, Toolchain};
use crate::orchestrator::{ConsoleReporter, Orchestrator, OutputSinks, discovery, shutdown};

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Parallel Terraform integration tests against per-job moto mocks
#[derive(Parser, Debug)]
#[command(name = "tftest")]
#[command(version = VERSION)]
#[command(about = "Parallel Terraform integration tests against per-job moto mocks", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every job under DIR
    Run(RunArgs),

    /// List the jobs under DIR without running them
    List {
        /// Directory holding the job directories
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,
        /// Test file pattern
        #[arg(long, value_name = "GLOB")]
        pattern: Option<String>,
    },

    /// Print the built-in service endpoint list
    Services,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory holding the job directories
    #[arg(value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Extra environment for every job process (repeatable)
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_env)]
    pub env: Vec<(String, String)>,

    /// Restrict the mocked endpoints (repeatable; default: all built-in services)
    #[arg(short = 's', long = "service", value_name = "NAME")]
    pub services: Vec<String>,

    /// Jobs run concurrently per CPU (values below 1 mean 1)
    #[arg(short = 'j', long, value_name = "N", default_value_t = 1, allow_negative_numbers = true)]
    pub jobs_per_cpu: i64,

    /// Test file pattern (default: *_test.go)
    #[arg(long, value_name = "GLOB")]
    pub pattern: Option<String>,

    /// Mock service program (default: moto_server)
    #[arg(long, value_name = "PROG")]
    pub mock_command: Option<String>,

    /// Infra tool program (default: terraform)
    #[arg(long, value_name = "PROG")]
    pub infra_command: Option<String>,

    /// Test runner program (default: go, with arguments `test -v`)
    #[arg(long, value_name = "PROG")]
    pub test_command: Option<String>,

    /// Argument passed to the test runner before the test file (repeatable)
    #[arg(long = "test-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub test_args: Vec<String>,

    /// Readiness probe attempts
    #[arg(long, value_name = "N", default_value_t = 20)]
    pub probe_attempts: u32,

    /// Pause before each readiness probe attempt, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    pub probe_interval_ms: u64,
}

impl RunArgs {
    /// Turn the parsed flags into a library run configuration.
    pub fn into_run_config(self) -> RunConfig {
        let mut toolchain = Toolchain::default();
        if let Some(pattern) = self.pattern {
            toolchain.test_pattern = pattern;
        }
        if let Some(mock) = self.mock_command {
            toolchain.mock_command = mock;
        }
        if let Some(infra) = self.infra_command {
            toolchain.infra_command = infra;
        }
        // a custom runner starts without the default `test -v`
        if let Some(test) = self.test_command {
            toolchain.test_command = test;
            toolchain.test_args = self.test_args;
        } else if !self.test_args.is_empty() {
            toolchain.test_args = self.test_args;
        }

        let probe = if self.probe_attempts == ProbeConfig::default().attempts && self.probe_interval_ms == 1000 {
            ProbeConfig::default()
        } else {
            ProbeConfig::new(self.probe_attempts, Duration::from_millis(self.probe_interval_ms))
        };

        RunConfig {
            dir: self.dir,
            env: self.env.into_iter().collect::<BTreeMap<_, _>>(),
            services: self.services,
            jobs_per_cpu: self.jobs_per_cpu,
            toolchain,
            probe,
            ..RunConfig::default()
        }
    }
}

fn parse_env(raw: &str) -> Result<(String, String), String> {
    config::parse_env_override(raw).map_err(|e| e.to_string())
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
pub fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Run(args) => run_jobs(args),
        Command::List { dir, pattern } => list_jobs(&dir, pattern.as_deref()),
        Command::Services => {
            for service in tftest_core::DEFAULT_SERVICES {
                println!("{service}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_jobs(args: RunArgs) -> CliResult<ExitCode> {
    let config = config::normalize(Some(args.into_run_config())).map_err(|e| CliError::failure(format!("Error: {e}")))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::failure(format!("Error: failed to start async runtime: {e}")))?;

    let mut reporter = ConsoleReporter::stdout();
    let report = runtime
        .block_on(Orchestrator::new(config).run(&mut reporter, shutdown::wait_for_interrupt()))
        .map_err(|e| CliError::failure(format!("Error: {e}")))?;

    Ok(ExitCode(report.exit_code()))
}

fn list_jobs(dir: &Path, pattern: Option<&str>) -> CliResult<ExitCode> {
    let pattern = pattern.map_or_else(|| Toolchain::default().test_pattern, str::to_string);
    let jobs = discovery::discover(dir, &pattern, &[], &OutputSinks::default())
        .map_err(|e| CliError::failure(format!("Error: {e}")))?;

    if jobs.is_empty() {
        eprintln!("No jobs found");
        return Ok(ExitCode::SUCCESS);
    }
    for job in &jobs {
        let test_file = job.test_file.strip_prefix(&job.root).unwrap_or(&job.test_file);
        println!("{:<20}{}", job.name, test_file.display());
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Tests
// ============================================================================

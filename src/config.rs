//! Run configuration and its normalisation.
//!
//! A [`RunConfig`] is what a caller (the CLI, or a test harness embedding the library) hands over; any field may be
//! left empty. [`normalize`] turns it into an immutable [`NormalizedConfig`]: defaults filled in, and the flat
//! `KEY=VALUE` environment every job process receives, with user overrides layered over the mock credentials.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use tftest_core::env::{self, MOCK_CREDENTIALS};

use crate::orchestrator::error::ConfigError;

/// Programs a job drives, and how test files are recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Mock service binary, started as `<mock_command> -p <port>`.
    pub mock_command: String,
    /// Infra tool, invoked as `<infra_command> init -no-color` then `<infra_command> apply -auto-approve -no-color`.
    pub infra_command: String,
    /// Test runner, invoked as `<test_command> <test_args...> <test file>`.
    pub test_command: String,
    pub test_args: Vec<String>,
    /// Glob matched against file names directly inside each directory.
    pub test_pattern: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            mock_command: "moto_server".to_string(),
            infra_command: "terraform".to_string(),
            test_command: "go".to_string(),
            test_args: vec!["test".to_string(), "-v".to_string()],
            test_pattern: "*_test.go".to_string(),
        }
    }
}

/// Readiness probe pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    pub attempts: u32,
    /// Sleep before every attempt, including the first.
    pub interval: Duration,
    /// Upper bound on a single GET so a half-open listener cannot stall the probe.
    pub request_timeout: Duration,
}

impl ProbeConfig {
    /// Custom pacing; the per-request timeout follows the interval, never below half a second.
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts,
            interval,
            request_timeout: interval.max(Duration::from_millis(500)),
        }
    }
}

impl Default for ProbeConfig {
    /// 20 attempts one second apart, each GET bounded by the interval.
    fn default() -> Self {
        Self::new(20, Duration::from_secs(1))
    }
}

/// Teardown pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupConfig {
    /// Attempts per artifact removal.
    pub attempts: u32,
    pub delay: Duration,
    /// How long an interrupted run waits for in-flight pipelines to notice their processes are gone.
    pub shutdown_grace: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(100),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Caller-supplied run configuration. Every field may be left at its zero value.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Directory that houses the job directories. Empty means the current directory.
    pub dir: PathBuf,
    /// Extra environment for every job process. Wins over the built-in mock credentials.
    pub env: BTreeMap<String, String>,
    /// Endpoint keys to point at the mock. Empty means every built-in service.
    pub services: Vec<String>,
    /// Jobs admitted per CPU. Non-positive means 1.
    pub jobs_per_cpu: i64,
    pub toolchain: Toolchain,
    pub probe: ProbeConfig,
    pub cleanup: CleanupConfig,
}

/// Fully populated, immutable configuration.
#[derive(Debug, Clone)]
pub struct NormalizedConfig {
    pub root: PathBuf,
    /// `KEY=VALUE` entries, sorted by key.
    pub env: Vec<String>,
    pub services: Vec<String>,
    pub jobs_per_cpu: usize,
    pub toolchain: Toolchain,
    pub probe: ProbeConfig,
    pub cleanup: CleanupConfig,
}

impl NormalizedConfig {
    /// The admission-gate capacity: `NumCPUs × JobsPerCPU`.
    pub fn max_in_flight(&self) -> usize {
        let cpus = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        cpus.saturating_mul(self.jobs_per_cpu).max(1)
    }
}

/// Validate and default a run configuration.
///
/// ## Errors
/// - [`ConfigError::Missing`] when no configuration was supplied at all.
pub fn normalize(config: Option<RunConfig>) -> Result<NormalizedConfig, ConfigError> {
    let config = config.ok_or(ConfigError::Missing)?;

    let root = if config.dir.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        config.dir
    };

    let jobs_per_cpu = usize::try_from(config.jobs_per_cpu).ok().filter(|n| *n > 0).unwrap_or(1);

    Ok(NormalizedConfig {
        root,
        env: merge_env(&config.env),
        services: config.services,
        jobs_per_cpu,
        toolchain: config.toolchain,
        probe: config.probe,
        cleanup: config.cleanup,
    })
}

/// Layer `overrides` over the mock credentials and flatten to sorted `KEY=VALUE` entries.
pub fn merge_env(overrides: &BTreeMap<String, String>) -> Vec<String> {
    let mut merged: BTreeMap<&str, &str> = MOCK_CREDENTIALS.iter().copied().collect();
    for (key, value) in overrides {
        merged.insert(key, value);
    }
    merged.into_iter().map(|(k, v)| env::entry(k, v)).collect()
}

/// Parse a `KEY=VALUE` override as given on the command line.
pub fn parse_env_override(raw: &str) -> Result<(String, String), ConfigError> {
    env::split_entry(raw)
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| ConfigError::InvalidEnvOverride(raw.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_an_error() {
        assert!(matches!(normalize(None), Err(ConfigError::Missing)));
    }

    #[test]
    fn test_defaults() {
        let cfg = normalize(Some(RunConfig::default())).unwrap();
        assert_eq!(cfg.root, PathBuf::from("."));
        assert_eq!(cfg.jobs_per_cpu, 1);
        assert!(cfg.services.is_empty());
        assert_eq!(
            cfg.env,
            vec![
                "AWS_ACCESS_KEY_ID=mock_access_key",
                "AWS_REGION=us-east-1",
                "AWS_SECRET_ACCESS_KEY=mock_secret_key",
            ]
        );
        assert_eq!(cfg.probe.attempts, 20);
        assert_eq!(cfg.cleanup.attempts, 10);
        assert!(cfg.max_in_flight() >= 1);
    }

    #[test]
    fn test_default_probe_window_stays_near_twenty_seconds() {
        let probe = ProbeConfig::default();
        assert!(probe.request_timeout <= probe.interval);
        let worst = (probe.interval + probe.request_timeout) * probe.attempts;
        assert!(worst <= Duration::from_secs(40), "{worst:?}");
    }

    #[test]
    fn test_override_wins_over_credentials() {
        let mut env = BTreeMap::new();
        env.insert("AWS_REGION".to_string(), "eu-west-1".to_string());
        env.insert("TFTEST_DEBUG".to_string(), "true".to_string());
        let merged = merge_env(&env);
        assert!(merged.contains(&"AWS_REGION=eu-west-1".to_string()));
        assert!(!merged.contains(&"AWS_REGION=us-east-1".to_string()));
        assert!(merged.contains(&"TFTEST_DEBUG=true".to_string()));
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn test_parse_env_override() {
        assert_eq!(parse_env_override("A=1").unwrap(), ("A".to_string(), "1".to_string()));
        assert!(matches!(parse_env_override("A"), Err(ConfigError::InvalidEnvOverride(_))));
    }
}

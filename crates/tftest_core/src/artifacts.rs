//! Files the orchestrator generates inside a job directory, and the ones the infra tool leaves behind.
//!
//! Every path is relative to the job directory, so two jobs never share an artifact.

/// Provider file rendered for each job before the infra tool runs.
pub const PROVIDER_FILE: &str = "provider.tf";

/// Local backend state written by `apply`.
pub const STATE_FILE: &str = "terraform.tfstate";

/// Lock info the infra tool holds while it touches the state. Released asynchronously, hence the cleanup retries.
pub const LOCK_FILE: &str = ".terraform.tfstate.lock.info";

/// Tool-local plugin/module cache created by `init`.
pub const CACHE_DIR: &str = ".terraform";

/// Loopback endpoint of a mock service listening on `port`.
pub fn endpoint_url(port: u16) -> String {
    format!("http://localhost:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        assert_eq!(endpoint_url(4566), "http://localhost:4566");
    }
}

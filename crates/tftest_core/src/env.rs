//! Environment variables exchanged between the orchestrator and its child processes.

/// Port of the job's mock service. Exported to every process a job starts so the provider file and the test
/// subject's clients can target the mock endpoint.
pub const MOTO_PORT: &str = "MOTO_PORT";

/// When set to `"true"` (case-insensitive) collaborators enable verbose tracing of their own operations.
pub const TFTEST_DEBUG: &str = "TFTEST_DEBUG";

pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_REGION: &str = "AWS_REGION";

/// Region every job runs in unless the caller overrides `AWS_REGION`.
pub const MOCK_REGION: &str = "us-east-1";

/// Credentials handed to every job before user overrides are applied.
///
/// The mock service accepts any credentials; these only need to be present so SDK clients and the infra tool
/// do not go looking for real ones.
pub const MOCK_CREDENTIALS: &[(&str, &str)] = &[
    (AWS_ACCESS_KEY_ID, "mock_access_key"),
    (AWS_SECRET_ACCESS_KEY, "mock_secret_key"),
    (AWS_REGION, MOCK_REGION),
];

/// Interpret a `TFTEST_DEBUG` value.
///
/// ## Returns
/// - (`bool`): `true` only for `"true"` in any letter case; unset or any other value is `false`.
pub fn is_debug_value(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Format a `KEY=VALUE` environment entry.
pub fn entry(key: &str, value: &str) -> String {
    format!("{key}={value}")
}

/// Split a `KEY=VALUE` entry at the first `=`.
///
/// Returns `None` when there is no `=` or the key is empty. The value may be empty and may itself contain `=`.
pub fn split_entry(entry: &str) -> Option<(&str, &str)> {
    let (key, value) = entry.split_once('=')?;
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

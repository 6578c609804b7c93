//! Property-based tests for configuration normalisation and job discovery
//!
//! These tests use proptest to verify invariants across many randomly
//! generated inputs, catching edge cases that hand-written tests might miss.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use tftest::config::{RunConfig, merge_env, normalize};
use tftest::orchestrator::OutputSinks;
use tftest::orchestrator::discovery::discover;
use tftest::orchestrator::sink::MemorySink;
use tftest_core::env::{MOCK_CREDENTIALS, split_entry};

fn env_key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("AWS_REGION".to_string()),
        Just("AWS_ACCESS_KEY_ID".to_string()),
        Just("AWS_SECRET_ACCESS_KEY".to_string()),
        "[A-Z][A-Z0-9_]{0,12}",
    ]
}

fn env_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9=_./-]{0,16}"
}

// =============================================================================
// Normalisation Properties
// =============================================================================

proptest! {
    /// Property: a non-positive parallelism factor always normalises to exactly 1
    #[test]
    fn non_positive_factor_normalises_to_one(factor in i64::MIN..=0) {
        let config = normalize(Some(RunConfig { jobs_per_cpu: factor, ..RunConfig::default() })).unwrap();
        prop_assert_eq!(config.jobs_per_cpu, 1);
    }

    /// Property: a positive factor is kept as given
    #[test]
    fn positive_factor_is_kept(factor in 1i64..=64) {
        let config = normalize(Some(RunConfig { jobs_per_cpu: factor, ..RunConfig::default() })).unwrap();
        prop_assert_eq!(config.jobs_per_cpu as i64, factor);
    }

    /// Property: every user override appears with the user's value, credentials or not
    #[test]
    fn overrides_always_win(overrides in prop::collection::btree_map(env_key_strategy(), env_value_strategy(), 0..8)) {
        let merged = merge_env(&overrides);
        let parsed: BTreeMap<&str, &str> = merged.iter().filter_map(|e| split_entry(e)).collect();

        // one entry per key, no duplicates
        prop_assert_eq!(parsed.len(), merged.len());
        for (key, value) in &overrides {
            prop_assert_eq!(parsed.get(key.as_str()).copied(), Some(value.as_str()));
        }
        for (key, value) in MOCK_CREDENTIALS {
            if !overrides.contains_key(*key) {
                prop_assert_eq!(parsed.get(key).copied(), Some(*value));
            }
        }
    }
}

// =============================================================================
// Discovery Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: a directory is a job iff it directly holds a matching test file
    #[test]
    fn jobs_are_exactly_the_directories_with_test_files(
        dirs in prop::collection::btree_map("[a-z][a-z0-9]{0,7}", any::<bool>(), 0..8)
    ) {
        let tmp = tempfile::tempdir().unwrap();
        for (name, has_test) in &dirs {
            let dir = tmp.path().join(name);
            std::fs::create_dir(&dir).unwrap();
            std::fs::write(dir.join("main.tf"), "").unwrap();
            if *has_test {
                std::fs::write(dir.join(format!("{name}_test.go")), "").unwrap();
            }
        }

        let jobs = discover(tmp.path(), "*_test.go", &[], &OutputSinks::memory(&MemorySink::new())).unwrap();
        let found: BTreeSet<String> = jobs.iter().map(|j| j.name.clone()).collect();
        let expected: BTreeSet<String> = dirs.iter().filter(|(_, t)| **t).map(|(n, _)| n.clone()).collect();
        prop_assert_eq!(found, expected);
    }
}

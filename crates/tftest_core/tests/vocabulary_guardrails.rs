use std::collections::HashSet;

use tftest_core::env;
use tftest_core::services::DEFAULT_SERVICES;

#[test]
fn default_services_are_unique_and_lowercase() {
    let mut seen = HashSet::new();
    for service in DEFAULT_SERVICES {
        assert!(seen.insert(*service), "duplicate service: {service}");
        assert!(
            service.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()),
            "service key must be a lowercase endpoint name: {service}"
        );
    }
    assert!(DEFAULT_SERVICES.len() > 100);
}

#[test]
fn mock_credential_keys_are_distinct() {
    let keys: HashSet<_> = env::MOCK_CREDENTIALS.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys.len(), env::MOCK_CREDENTIALS.len());
    assert!(!keys.contains(env::MOTO_PORT));
}

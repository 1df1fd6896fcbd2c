/// Placeholder and test domains that must never enter the inventory.
const TEST_DOMAIN_BLOCKLIST: &[&str] = &[
    "example.com",
    "example.org",
    "example.net",
    "test.com",
    "test.org",
    "test.net",
    "domain.com",
    "domain.org",
    "domain.net",
    "localhost",
    "invalid",
    "example",
    "test",
    "local",
    "internal",
    "localdomain",
];

const TEST_PREFIXES: &[&str] = &[
    "test-", "test.", "example-", "example.", "demo-", "demo.", "staging-", "dev-",
];

/// Whether a discovered domain should be skipped as a test/placeholder name.
pub fn is_test_domain(name: &str) -> bool {
    let name = name.trim().to_lowercase();

    TEST_DOMAIN_BLOCKLIST.contains(&name.as_str())
        || TEST_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

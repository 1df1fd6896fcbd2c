use tracing::debug;

/// Record types the inventory vouches for. Anything else is still collected.
const KNOWN_RECORD_TYPES: &[&str] = &[
    "A", "AAAA", "CNAME", "MX", "TXT", "NS", "SOA", "SRV", "CAA", "PTR", "NAPTR", "DNSKEY", "DS",
    "TLSA", "SSHFP", "SPF",
];

/// Short-form subdomain as returned by registrar APIs: `"@"` and the empty
/// string both denote the apex.
pub fn normalize_subdomain(name: &str) -> String {
    let name = name.trim();
    if name == "@" || name.is_empty() {
        String::new()
    } else {
        name.to_lowercase()
    }
}

pub fn normalize_record_type(record_type: &str) -> String {
    let normalized = record_type.trim().to_uppercase();
    if !KNOWN_RECORD_TYPES.contains(&normalized.as_str()) {
        debug!("Collecting unrecognized record type: {normalized}");
    }
    normalized
}

/// Derive the subdomain from a fully-qualified hostname and its zone:
/// the longest prefix such that `prefix + "." + zone == hostname`,
/// compared case-insensitively with trailing dots stripped. The zone
/// apex maps to the empty string.
pub fn extract_subdomain(hostname: &str, zone: &str) -> String {
    let host = hostname.trim().trim_end_matches('.').to_lowercase();
    let zone = zone.trim().trim_end_matches('.').to_lowercase();

    if host == zone {
        return String::new();
    }
    if let Some(prefix) = host.strip_suffix(&format!(".{zone}")) {
        return prefix.to_string();
    }

    // Hostname not under the zone at all; keep it whole rather than lose it.
    host
}

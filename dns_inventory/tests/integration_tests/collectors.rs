use std::time::Duration;

use dns_inventory::collectors::{
    CloudflareDnsCollector, Collector, GoDaddyDnsCollector, GoDaddyDomainsCollector,
};
use dns_inventory::config::{CloudflareConfig, FetchConfig, GoDaddyConfig};
use dns_inventory::fetch_client::FetchClient;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param_is_missing};
use wiremock::{Mock, ResponseTemplate};

use crate::common::mock_servers::*;

fn fetch() -> FetchClient {
    FetchClient::new(FetchConfig {
        max_retries: 1,
        backoff_factor: 0.0,
        sleep_on_429: Duration::from_millis(20),
        request_timeout: Duration::from_secs(5),
    })
    .expect("Failed to build fetch client")
}

fn godaddy_config(base_url: String, domains_limit: usize, records_limit: usize) -> GoDaddyConfig {
    GoDaddyConfig {
        api_key: "k".to_string(),
        api_secret: "s".to_string(),
        base_url,
        domains_limit,
        records_limit,
    }
}

fn cloudflare_config(base_url: String, zones_per_page: usize) -> CloudflareConfig {
    CloudflareConfig {
        api_token: "cf-token".to_string(),
        base_url,
        zones_per_page,
        records_per_page: 100,
    }
}

#[tokio::test]
async fn godaddy_marker_pagination_filters_test_domains() {
    let mocks = MockUpstreams::start().await;
    // Full first page (limit 2): the marker is the raw last entry.
    mocks
        .setup_godaddy_domains_page(
            None,
            json!([gd_domain("alpha.com"), gd_domain("example.com")]),
        )
        .await;
    // Short second page terminates the sweep.
    mocks
        .setup_godaddy_domains_page(Some("example.com"), json!([gd_domain("bravo.com")]))
        .await;

    let collector =
        GoDaddyDomainsCollector::new(godaddy_config(mocks.godaddy_url(), 2, 100), fetch());
    let result = collector.collect(&CancellationToken::new()).await;

    assert!(result.error.is_none());
    let names: Vec<&str> = result.domains.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["alpha.com", "bravo.com"]);
    assert!(result.dns_records.is_empty());
    assert!(result.checked_domains.is_empty());
}

#[tokio::test]
async fn godaddy_sends_sso_key_auth() {
    let mocks = MockUpstreams::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/domains"))
        .and(header("authorization", "sso-key k:s"))
        .and(query_param_is_missing("marker"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([gd_domain("alpha.com")])))
        .expect(1)
        .mount(&mocks.godaddy)
        .await;

    let collector =
        GoDaddyDomainsCollector::new(godaddy_config(mocks.godaddy_url(), 100, 100), fetch());
    let result = collector.collect(&CancellationToken::new()).await;

    assert!(result.error.is_none());
    assert_eq!(result.domains.len(), 1);
}

#[tokio::test]
async fn godaddy_dns_quota_keeps_partial_sweep() {
    let mocks = MockUpstreams::start().await;
    mocks
        .setup_godaddy_domains(json!([
            gd_domain("a.com"),
            gd_domain("b.com"),
            gd_domain("c.com")
        ]))
        .await;
    mocks
        .setup_godaddy_records("a.com", json!([gd_record("www", "A", "1.2.3.4")]))
        .await;
    mocks
        .setup_godaddy_records_error("b.com", 403, r#"{"code":"QUOTA_EXCEEDED"}"#)
        .await;
    // Quota must stop the enumeration before c.com is ever asked for.
    Mock::given(method("GET"))
        .and(path("/v1/domains/c.com/records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mocks.godaddy)
        .await;

    let collector = GoDaddyDnsCollector::new(godaddy_config(mocks.godaddy_url(), 100, 100), fetch());
    let result = collector.collect(&CancellationToken::new()).await;

    assert!(result.error.is_none(), "quota is not fatal");
    assert_eq!(result.domains.len(), 3, "domain phase succeeded in full");
    assert_eq!(result.checked_domains, vec!["a.com".to_string()]);
    assert_eq!(result.dns_records.len(), 1);
}

#[tokio::test]
async fn godaddy_dns_not_found_skips_single_domain() {
    let mocks = MockUpstreams::start().await;
    mocks
        .setup_godaddy_domains(json!([gd_domain("a.com"), gd_domain("b.com"), gd_domain("c.com")]))
        .await;
    mocks
        .setup_godaddy_records("a.com", json!([gd_record("@", "A", "1.1.1.1")]))
        .await;
    mocks.setup_godaddy_records_error("b.com", 404, "").await;
    mocks
        .setup_godaddy_records("c.com", json!([gd_record("mail", "A", "2.2.2.2")]))
        .await;

    let collector = GoDaddyDnsCollector::new(godaddy_config(mocks.godaddy_url(), 100, 100), fetch());
    let result = collector.collect(&CancellationToken::new()).await;

    assert!(result.error.is_none());
    assert_eq!(
        result.checked_domains,
        vec!["a.com".to_string(), "c.com".to_string()]
    );
    assert_eq!(result.dns_records.len(), 2);
    // The apex record arrives with an empty subdomain.
    assert_eq!(result.dns_records[0].subdomain, "");
}

#[tokio::test]
async fn godaddy_records_paginate_by_offset() {
    let mocks = MockUpstreams::start().await;
    mocks.setup_godaddy_domains(json!([gd_domain("a.com")])).await;
    mocks
        .setup_godaddy_records_page(
            "a.com",
            0,
            json!([gd_record("www", "A", "1.1.1.1"), gd_record("api", "A", "1.1.1.2")]),
        )
        .await;
    mocks
        .setup_godaddy_records_page("a.com", 2, json!([gd_record("mail", "MX", "mx.a.com")]))
        .await;

    let collector = GoDaddyDnsCollector::new(godaddy_config(mocks.godaddy_url(), 100, 2), fetch());
    let result = collector.collect(&CancellationToken::new()).await;

    assert!(result.error.is_none());
    assert_eq!(result.dns_records.len(), 3);
    assert_eq!(result.checked_domains, vec!["a.com".to_string()]);
}

#[tokio::test]
async fn cloudflare_bad_token_aborts_with_no_partial_state() {
    let mocks = MockUpstreams::start().await;
    mocks.setup_cloudflare_verify(false).await;
    Mock::given(method("GET"))
        .and(path("/zones"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "result": []})))
        .expect(0)
        .mount(&mocks.cloudflare)
        .await;

    let collector =
        CloudflareDnsCollector::new(cloudflare_config(mocks.cloudflare_url(), 50), fetch());
    let result = collector.collect(&CancellationToken::new()).await;

    let error = result.error.expect("verification failure is fatal");
    assert!(error.contains("token verification"), "got: {error}");
    assert!(result.domains.is_empty());
    assert!(result.dns_records.is_empty());
    assert!(result.checked_domains.is_empty());
}

#[tokio::test]
async fn cloudflare_paginates_zones_and_extracts_subdomains() {
    let mocks = MockUpstreams::start().await;
    mocks.setup_cloudflare_verify(true).await;
    mocks
        .setup_cloudflare_zones_page(1, 2, json!([cf_zone("z1", "mycorp.com")]))
        .await;
    mocks
        .setup_cloudflare_zones_page(2, 2, json!([cf_zone("z2", "other.io")]))
        .await;
    mocks
        .setup_cloudflare_records_page(
            "z1",
            1,
            1,
            json!([
                cf_record("www.mycorp.com", "A", "1.2.3.4"),
                cf_record("mycorp.com", "TXT", "v=spf1 -all")
            ]),
        )
        .await;
    mocks
        .setup_cloudflare_records_page("z2", 1, 1, json!([cf_record("a.b.other.io", "CNAME", "other.io")]))
        .await;

    let collector =
        CloudflareDnsCollector::new(cloudflare_config(mocks.cloudflare_url(), 1), fetch());
    let result = collector.collect(&CancellationToken::new()).await;

    assert!(result.error.is_none());
    let domain_names: Vec<&str> = result.domains.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(domain_names, vec!["mycorp.com", "other.io"]);
    assert_eq!(result.checked_domains.len(), 2);

    let subdomains: Vec<&str> = result
        .dns_records
        .iter()
        .map(|r| r.subdomain.as_str())
        .collect();
    assert_eq!(subdomains, vec!["www", "", "a.b"]);
}

#[tokio::test]
async fn cloudflare_zone_record_failure_skips_only_that_zone() {
    let mocks = MockUpstreams::start().await;
    mocks.setup_cloudflare_verify(true).await;
    mocks
        .setup_cloudflare_zones_page(
            1,
            1,
            json!([cf_zone("z1", "mycorp.com"), cf_zone("z2", "other.io")]),
        )
        .await;
    Mock::given(method("GET"))
        .and(path("/zones/z1/dns_records"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mocks.cloudflare)
        .await;
    mocks
        .setup_cloudflare_records_page("z2", 1, 1, json!([cf_record("other.io", "A", "9.9.9.9")]))
        .await;

    let collector =
        CloudflareDnsCollector::new(cloudflare_config(mocks.cloudflare_url(), 50), fetch());
    let result = collector.collect(&CancellationToken::new()).await;

    assert!(result.error.is_none(), "per-zone failures are not fatal");
    assert_eq!(result.domains.len(), 2, "both zones remain observed domains");
    assert_eq!(result.checked_domains, vec!["other.io".to_string()]);
    assert_eq!(result.dns_records.len(), 1);
}

#[tokio::test]
async fn cancelled_sweep_fails_with_cancelled_message() {
    let mocks = MockUpstreams::start().await;
    mocks.setup_godaddy_domains(json!([gd_domain("a.com")])).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let collector =
        GoDaddyDomainsCollector::new(godaddy_config(mocks.godaddy_url(), 100, 100), fetch());
    let result = collector.collect(&cancel).await;

    assert_eq!(result.error.as_deref(), Some("cancelled"));
    assert!(result.domains.is_empty());
}

#![allow(dead_code)]

use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct MockUpstreams {
    pub godaddy: MockServer,
    pub cloudflare: MockServer,
}

impl MockUpstreams {
    pub async fn start() -> Self {
        Self {
            godaddy: MockServer::start().await,
            cloudflare: MockServer::start().await,
        }
    }

    pub fn godaddy_url(&self) -> String {
        self.godaddy.uri()
    }

    pub fn cloudflare_url(&self) -> String {
        self.cloudflare.uri()
    }

    /// Single-page GoDaddy domain list (no marker).
    pub async fn setup_godaddy_domains(&self, domains: Value) {
        Mock::given(method("GET"))
            .and(path("/v1/domains"))
            .and(query_param_is_missing("marker"))
            .respond_with(ResponseTemplate::new(200).set_body_json(domains))
            .mount(&self.godaddy)
            .await;
    }

    /// Single-page GoDaddy domain list with an artificial response delay,
    /// to hold a sync open while triggers race it.
    pub async fn setup_godaddy_domains_delayed(&self, domains: Value, delay: Duration) {
        Mock::given(method("GET"))
            .and(path("/v1/domains"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(domains)
                    .set_delay(delay),
            )
            .mount(&self.godaddy)
            .await;
    }

    /// One page of a marker-paginated GoDaddy domain list.
    pub async fn setup_godaddy_domains_page(&self, marker: Option<&str>, domains: Value) {
        let mock = Mock::given(method("GET")).and(path("/v1/domains"));
        let mock = match marker {
            Some(marker) => mock.and(query_param("marker", marker)),
            None => mock.and(query_param_is_missing("marker")),
        };
        mock.respond_with(ResponseTemplate::new(200).set_body_json(domains))
            .mount(&self.godaddy)
            .await;
    }

    /// Single-page record list for one GoDaddy domain.
    pub async fn setup_godaddy_records(&self, domain: &str, records: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/domains/{domain}/records")))
            .respond_with(ResponseTemplate::new(200).set_body_json(records))
            .mount(&self.godaddy)
            .await;
    }

    /// One page of an offset-paginated record list.
    pub async fn setup_godaddy_records_page(&self, domain: &str, offset: usize, records: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/domains/{domain}/records")))
            .and(query_param("offset", offset.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(records))
            .mount(&self.godaddy)
            .await;
    }

    /// Error response for one GoDaddy domain's records.
    pub async fn setup_godaddy_records_error(&self, domain: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/domains/{domain}/records")))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.godaddy)
            .await;
    }

    pub async fn setup_cloudflare_verify(&self, success: bool) {
        let status = if success { 200 } else { 403 };
        Mock::given(method("GET"))
            .and(path("/user/tokens/verify"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "success": success,
                "errors": if success { json!([]) } else { json!([{"code": 1000, "message": "Invalid API Token"}]) },
                "result": {"status": "active"}
            })))
            .mount(&self.cloudflare)
            .await;
    }

    /// One page of the zone list, with the envelope's pagination info.
    pub async fn setup_cloudflare_zones_page(&self, page: u32, total_pages: u32, zones: Value) {
        Mock::given(method("GET"))
            .and(path("/zones"))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "result": zones,
                "result_info": {"page": page, "total_pages": total_pages}
            })))
            .mount(&self.cloudflare)
            .await;
    }

    /// One page of a zone's record list.
    pub async fn setup_cloudflare_records_page(
        &self,
        zone_id: &str,
        page: u32,
        total_pages: u32,
        records: Value,
    ) {
        Mock::given(method("GET"))
            .and(path(format!("/zones/{zone_id}/dns_records")))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "result": records,
                "result_info": {"page": page, "total_pages": total_pages}
            })))
            .mount(&self.cloudflare)
            .await;
    }
}

/// A GoDaddy domain list entry.
pub fn gd_domain(name: &str) -> Value {
    json!({"domain": name, "status": "ACTIVE", "expires": "2027-01-15T00:00:00Z"})
}

/// A GoDaddy DNS record entry.
pub fn gd_record(name: &str, record_type: &str, data: &str) -> Value {
    json!({"name": name, "type": record_type, "data": data, "ttl": 300})
}

/// A Cloudflare zone entry.
pub fn cf_zone(id: &str, name: &str) -> Value {
    json!({"id": id, "name": name, "status": "active"})
}

/// A Cloudflare DNS record entry (fully-qualified name).
pub fn cf_record(name: &str, record_type: &str, content: &str) -> Value {
    json!({"name": name, "type": record_type, "content": content, "ttl": 1})
}

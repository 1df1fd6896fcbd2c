use std::env;
use std::path::PathBuf;
use std::time::Duration;

use color_eyre::{Result, eyre::eyre};

/// Credentials and pagination sizes for the GoDaddy registrar API.
#[derive(Debug, Clone)]
pub struct GoDaddyConfig {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
    pub domains_limit: usize,
    pub records_limit: usize,
}

/// Credentials and pagination sizes for the Cloudflare API.
#[derive(Debug, Clone)]
pub struct CloudflareConfig {
    pub api_token: String,
    pub base_url: String,
    pub zones_per_page: usize,
    pub records_per_page: usize,
}

/// Retry policy for the upstream fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub sleep_on_429: Duration,
    pub request_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor: 1.5,
            sleep_on_429: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub dns_cron: String,
    pub domains_cron: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dns_cron: "0 6 * * *".to_string(),
            domains_cron: "0 0 * * 0".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_max_idle: u32,
    pub server_host: String,
    pub server_port: u16,
    pub log_level: String,
    pub godaddy: Option<GoDaddyConfig>,
    pub cloudflare: Option<CloudflareConfig>,
    pub fetch: FetchConfig,
    pub scheduler: SchedulerConfig,
    pub json_output_dir: PathBuf,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn new_from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let godaddy = match (env::var("GODADDY_API_KEY"), env::var("GODADDY_API_SECRET")) {
            (Ok(api_key), Ok(api_secret)) => Some(GoDaddyConfig {
                api_key,
                api_secret,
                base_url: env::var("GODADDY_BASE_URL")
                    .unwrap_or("https://api.godaddy.com".to_string()),
                domains_limit: env_parse("GODADDY_DOMAINS_LIMIT", 1000),
                records_limit: env_parse("GODADDY_RECORDS_LIMIT", 100),
            }),
            _ => None,
        };

        let cloudflare = env::var("CLOUDFLARE_API_TOKEN")
            .ok()
            .map(|api_token| CloudflareConfig {
                api_token,
                base_url: env::var("CLOUDFLARE_BASE_URL")
                    .unwrap_or("https://api.cloudflare.com/client/v4".to_string()),
                zones_per_page: env_parse("CLOUDFLARE_ZONES_PER_PAGE", 50),
                records_per_page: env_parse("CLOUDFLARE_RECORDS_PER_PAGE", 1000),
            });

        let config = Self {
            database_url,
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 25),
            database_max_idle: env_parse("DATABASE_MAX_IDLE", 5),
            server_host: env::var("SERVER_HOST").unwrap_or("0.0.0.0".to_string()),
            server_port: env_parse("SERVER_PORT", 8080),
            log_level: env::var("LOG_LEVEL").unwrap_or("info".to_string()),
            godaddy,
            cloudflare,
            fetch: FetchConfig {
                max_retries: env_parse("RATE_LIMIT_MAX_RETRIES", 5),
                backoff_factor: env_parse("RATE_LIMIT_BACKOFF_FACTOR", 1.5),
                sleep_on_429: Duration::from_secs(env_parse("RATE_LIMIT_SLEEP_ON_429", 30)),
                request_timeout: Duration::from_secs(env_parse("HTTP_REQUEST_TIMEOUT", 60)),
            },
            scheduler: SchedulerConfig {
                enabled: env_parse("SCHEDULER_ENABLED", true),
                dns_cron: env::var("SCHEDULER_DNS_CRON").unwrap_or("0 6 * * *".to_string()),
                domains_cron: env::var("SCHEDULER_DOMAINS_CRON")
                    .unwrap_or("0 0 * * 0".to_string()),
            },
            json_output_dir: PathBuf::from(
                env::var("JSON_OUTPUT_DIR").unwrap_or("../data".to_string()),
            ),
        };

        config.validate()?;

        Ok(config)
    }

    /// Startup validation beyond the presence of `DATABASE_URL`: a process
    /// with no configured collector has nothing to do.
    fn validate(&self) -> Result<()> {
        if self.godaddy.is_none() && self.cloudflare.is_none() {
            return Err(eyre!(
                "No collector credentials configured: set GODADDY_API_KEY/GODADDY_API_SECRET \
                 and/or CLOUDFLARE_API_TOKEN"
            ));
        }
        Ok(())
    }

    // Test helper
    pub fn new_for_test(
        godaddy_base_url: Option<String>,
        cloudflare_base_url: Option<String>,
        json_output_dir: PathBuf,
    ) -> Self {
        Self {
            database_url: "dummy".to_string(),
            database_max_connections: 5,
            database_max_idle: 1,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            log_level: "info".to_string(),
            godaddy: godaddy_base_url.map(|base_url| GoDaddyConfig {
                api_key: "test-key".to_string(),
                api_secret: "test-secret".to_string(),
                base_url,
                domains_limit: 2,
                records_limit: 2,
            }),
            cloudflare: cloudflare_base_url.map(|base_url| CloudflareConfig {
                api_token: "test-token".to_string(),
                base_url,
                zones_per_page: 2,
                records_per_page: 2,
            }),
            fetch: FetchConfig {
                max_retries: 3,
                backoff_factor: 0.0,
                sleep_on_429: Duration::from_millis(50),
                request_timeout: Duration::from_secs(5),
            },
            scheduler: SchedulerConfig::default(),
            json_output_dir,
        }
    }
}

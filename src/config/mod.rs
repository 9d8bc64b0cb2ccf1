use std::collections::HashSet;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; PageMetadataBot/1.0; +https://github.com/mozilla/page-metadata-service)";
pub const DEFAULT_ROBOTS_USER_AGENT: &str = "PageMetadataBot";
pub const DEFAULT_MAX_URLS: usize = 20;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub is_dev: bool,
    pub max_urls: usize,
    pub fetch_timeout: Duration,
    pub robots_timeout: Duration,
    pub image_timeout: Duration,
    /// Bound on each DNS lookup made by the private-address guard.
    pub dns_timeout: Duration,
    /// Upper bound on pipelines fetching at once. `None` leaves the batch cap
    /// as the only bound.
    pub max_concurrent_fetches: Option<usize>,
    pub respect_robots: bool,
    pub allow_private_networks: bool,
    /// Lowercased hostnames that are never fetched.
    pub blacklist: HashSet<String>,
    pub user_agent: String,
    pub robots_user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 7001,
            is_dev: true,
            max_urls: DEFAULT_MAX_URLS,
            fetch_timeout: Duration::from_secs(10),
            robots_timeout: Duration::from_secs(10),
            image_timeout: Duration::from_secs(10),
            dns_timeout: Duration::from_secs(5),
            max_concurrent_fetches: None,
            respect_robots: true,
            allow_private_networks: false,
            blacklist: HashSet::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            robots_user_agent: DEFAULT_ROBOTS_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let mut blacklist = env::var("BLACKLIST_DOMAINS")
            .map(|v| parse_domain_list(&v))
            .unwrap_or_default();
        if let Ok(path) = env::var("BLACKLIST_FILE") {
            let contents = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::Io { path, source })?;
            blacklist.extend(parse_domain_list(&contents));
        }

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_var::<u16>("SERVER_PORT", "port number")?.unwrap_or(defaults.server_port),
            is_dev: env::var("APP_ENV").as_deref() != Ok("production"),
            max_urls: parse_var::<usize>("MAX_URLS", "positive integer")?
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_urls),
            fetch_timeout: parse_secs("FETCH_TIMEOUT_SECS")?.unwrap_or(defaults.fetch_timeout),
            robots_timeout: parse_secs("ROBOTS_TIMEOUT_SECS")?.unwrap_or(defaults.robots_timeout),
            image_timeout: parse_secs("IMAGE_TIMEOUT_SECS")?.unwrap_or(defaults.image_timeout),
            dns_timeout: parse_secs("DNS_TIMEOUT_SECS")?.unwrap_or(defaults.dns_timeout),
            max_concurrent_fetches: parse_var::<usize>("MAX_CONCURRENT_FETCHES", "positive integer")?
                .filter(|n| *n > 0),
            respect_robots: parse_bool("RESPECT_ROBOTS")?.unwrap_or(defaults.respect_robots),
            allow_private_networks: parse_bool("ALLOW_PRIVATE_NETWORKS")?
                .unwrap_or(defaults.allow_private_networks),
            blacklist,
            user_agent: env::var("USER_AGENT").unwrap_or(defaults.user_agent),
            robots_user_agent: env::var("ROBOTS_USER_AGENT").unwrap_or(defaults.robots_user_agent),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

/// Parse a comma- or newline-separated domain list. `#` starts a comment.
pub fn parse_domain_list(raw: &str) -> HashSet<String> {
    raw.lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .flat_map(|line| line.split(','))
        .map(|d| d.trim().trim_end_matches('.').to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

fn parse_var<T: FromStr>(name: &'static str, expected: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                name,
                expected,
                value,
            }),
        Err(_) => Ok(None),
    }
}

fn parse_secs(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    Ok(parse_var::<u64>(name, "number of seconds")?.map(Duration::from_secs))
}

fn parse_bool(name: &'static str) -> Result<Option<bool>, ConfigError> {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid {
                name,
                expected: "boolean",
                value,
            }),
        },
        Err(_) => Ok(None),
    }
}

use std::collections::HashSet;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client as ReqwestClient;
use url::Url;

use super::fetcher::get_following_redirects;
use crate::error::PipelineError;
use crate::metrics::{MetricName, Metrics};

pub const BLACKLIST_DENIED: &str = "Blacklist disallows this request";
pub const PRIVATE_ADDRESS_DENIED: &str = "URL resolves to a private or reserved address";

// ── Private address guard ──────────────────────────────────────────────────

/// Returns `true` if `ip` is a private, loopback, or link-local address.
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            matches!(
                o,
                [127, ..]
                    | [10, ..]
                    | [169, 254, ..]
                    | [192, 168, ..]
                    | [0, ..]
                    | [255, 255, 255, 255]
            ) || (o[0] == 172 && (16..=31).contains(&o[1]))
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00 == 0xfc00)
                || (v6.segments()[0] & 0xffc0 == 0xfe80)
                || v6.to_ipv4_mapped().is_some_and(|v4| is_private_ip(IpAddr::V4(v4)))
        }
    }
}

/// Refuses URLs whose host resolves to a private or reserved address.
///
/// Checked before every outbound request, redirect hops included.
#[derive(Debug, Clone, Copy)]
pub struct AddressGuard {
    allow_private_networks: bool,
    lookup_timeout: Duration,
}

impl AddressGuard {
    pub fn new(allow_private_networks: bool, lookup_timeout: Duration) -> Self {
        AddressGuard {
            allow_private_networks,
            lookup_timeout,
        }
    }

    pub async fn check(&self, target: &Url) -> Result<(), PipelineError> {
        if self.allow_private_networks {
            return Ok(());
        }

        let host = target
            .host_str()
            .ok_or_else(|| PipelineError::InvalidUrl("URL has no host".into()))?;
        let port = target.port_or_known_default().unwrap_or(80);
        // IPv6 literals come back bracketed from host_str().
        let host = host.trim_start_matches('[').trim_end_matches(']');

        let addrs = bounded_lookup(
            tokio::net::lookup_host((host, port)),
            self.lookup_timeout,
            host,
        )
        .await?;

        if addrs.into_iter().any(is_private_ip) {
            return Err(PipelineError::PolicyDenied(PRIVATE_ADDRESS_DENIED.into()));
        }

        Ok(())
    }
}

/// Await a DNS lookup for at most `limit`.
async fn bounded_lookup<F, I>(lookup: F, limit: Duration, host: &str) -> Result<Vec<IpAddr>, PipelineError>
where
    F: Future<Output = io::Result<I>>,
    I: Iterator<Item = SocketAddr>,
{
    match tokio::time::timeout(limit, lookup).await {
        Ok(Ok(addrs)) => Ok(addrs.map(|a| a.ip()).collect()),
        Ok(Err(e)) => {
            tracing::warn!(error = ?e, host = %host, "Could not resolve URL host");
            Err(PipelineError::Network(format!("Could not resolve host {host}")))
        }
        Err(_) => {
            tracing::warn!(host = %host, timeout = ?limit, "DNS lookup timed out");
            Err(PipelineError::Network(format!("DNS lookup timed out for host {host}")))
        }
    }
}

// ── robots.txt ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    allow: bool,
    pattern: String,
}

#[derive(Debug, Clone, Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

/// A parsed robots.txt file.
#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    groups: Vec<Group>,
}

impl RobotsTxt {
    pub fn parse(text: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current: Option<Group> = None;
        // Consecutive user-agent lines share one group.
        let mut collecting_agents = false;

        for line in text.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if !collecting_agents {
                        if let Some(group) = current.take() {
                            groups.push(group);
                        }
                        current = Some(Group::default());
                        collecting_agents = true;
                    }
                    // A blank agent still opens a group, but one that matches no crawler.
                    if let Some(group) = current.as_mut().filter(|_| !value.is_empty()) {
                        group.agents.push(value.to_ascii_lowercase());
                    }
                }
                "allow" | "disallow" => {
                    collecting_agents = false;
                    let Some(group) = current.as_mut() else {
                        continue;
                    };
                    // An empty Disallow allows everything; an empty Allow means nothing.
                    if value.is_empty() {
                        continue;
                    }
                    group.rules.push(Rule {
                        allow: key == "allow",
                        pattern: value.to_string(),
                    });
                }
                _ => {
                    collecting_agents = false;
                }
            }
        }

        if let Some(group) = current {
            groups.push(group);
        }

        RobotsTxt { groups }
    }

    /// Whether `url` may be fetched by the crawler identified by `agent`.
    pub fn is_allowed(&self, url: &Url, agent: &str) -> bool {
        let agent = agent.to_ascii_lowercase();
        let Some(group) = self.group_for(&agent) else {
            return true;
        };

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        let mut best: Option<(usize, bool)> = None;
        for rule in &group.rules {
            if !pattern_matches(&rule.pattern, &path) {
                continue;
            }
            let specificity = rule.pattern.len();
            best = match best {
                Some((len, allow)) if len > specificity || (len == specificity && allow) => {
                    Some((len, allow))
                }
                _ => Some((specificity, rule.allow)),
            };
        }

        best.map_or(true, |(_, allow)| allow)
    }

    fn group_for(&self, agent: &str) -> Option<&Group> {
        let named = self
            .groups
            .iter()
            .filter_map(|g| {
                g.agents
                    .iter()
                    .filter(|a| a.as_str() != "*" && agent.contains(a.as_str()))
                    .map(|a| a.len())
                    .max()
                    .map(|len| (len, g))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, g)| g);

        named.or_else(|| {
            self.groups
                .iter()
                .find(|g| g.agents.iter().any(|a| a == "*"))
        })
    }
}

/// Match a robots.txt path pattern supporting `*` wildcards and a `$` anchor.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    let mut pieces = pattern.split('*');
    let first = pieces.next().unwrap_or_default();
    if !path.starts_with(first) {
        return false;
    }
    let mut pos = first.len();
    let rest: Vec<&str> = pieces.collect();

    for (i, piece) in rest.iter().enumerate() {
        let is_last = i + 1 == rest.len();
        if is_last && anchored {
            return path.len() >= pos + piece.len() && path.ends_with(piece);
        }
        match path[pos..].find(piece) {
            Some(idx) => pos += idx + piece.len(),
            None => return false,
        }
    }

    !anchored || pos == path.len()
}

// ── Policy gate ────────────────────────────────────────────────────────────

/// Pre-fetch admission checks for a single URL.
pub struct PolicyGate {
    blacklist: HashSet<String>,
    guard: AddressGuard,
    respect_robots: bool,
    robots_agent: String,
    robots_timeout: Duration,
    metrics: Arc<dyn Metrics>,
}

impl PolicyGate {
    pub fn new(
        blacklist: HashSet<String>,
        guard: AddressGuard,
        respect_robots: bool,
        robots_agent: String,
        robots_timeout: Duration,
        metrics: Arc<dyn Metrics>,
    ) -> Self {
        PolicyGate {
            blacklist,
            guard,
            respect_robots,
            robots_agent,
            robots_timeout,
            metrics,
        }
    }

    /// Run every enabled check. The first denial wins.
    pub async fn check(&self, client: &ReqwestClient, target: &Url) -> Result<(), PipelineError> {
        self.check_blacklist(target)?;
        self.check_address(target).await?;
        if self.respect_robots {
            self.check_robots(client, target).await?;
        }
        Ok(())
    }

    pub fn check_blacklist(&self, target: &Url) -> Result<(), PipelineError> {
        let host = target
            .host_str()
            .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
            .unwrap_or_default();

        if self.blacklist.contains(&host) {
            self.metrics.increment(MetricName::BlacklistDeny);
            return Err(PipelineError::PolicyDenied(BLACKLIST_DENIED.into()));
        }

        self.metrics.increment(MetricName::BlacklistAllow);
        Ok(())
    }

    /// Resolve the target host and reject private or reserved addresses.
    pub async fn check_address(&self, target: &Url) -> Result<(), PipelineError> {
        self.guard.check(target).await
    }

    /// Fetch and evaluate the site's robots.txt. Unreachable or missing files
    /// allow the request.
    pub async fn check_robots(
        &self,
        client: &ReqwestClient,
        target: &Url,
    ) -> Result<(), PipelineError> {
        let robots_url = match target.join("/robots.txt") {
            Ok(u) => u,
            Err(_) => {
                self.metrics.increment(MetricName::RobotsNotFound);
                return Ok(());
            }
        };

        let Some(text) = self.fetch_robots(client, &robots_url).await else {
            self.metrics.increment(MetricName::RobotsNotFound);
            return Ok(());
        };

        if RobotsTxt::parse(&text).is_allowed(target, &self.robots_agent) {
            self.metrics.increment(MetricName::RobotsAllowed);
            Ok(())
        } else {
            self.metrics.increment(MetricName::RobotsDisallowed);
            Err(PipelineError::RobotsDenied)
        }
    }

    async fn fetch_robots(&self, client: &ReqwestClient, robots_url: &Url) -> Option<String> {
        let guard = self.guard;
        let response = get_following_redirects(
            client,
            robots_url,
            Some(self.robots_timeout),
            move |hop| async move { guard.check(&hop).await },
        )
        .await
        .map_err(|e| tracing::debug!(error = %e, url = %robots_url, "robots.txt unreachable"))
        .ok()?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), url = %robots_url, "robots.txt not found");
            return None;
        }

        response.text().await.ok()
    }
}

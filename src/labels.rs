//! Hostname extraction from router rule labels.
//!
//! A container declares routers through labels such as
//!
//! ```text
//! traefik.http.routers.web.rule = Host(`example.com`) || Host(`www.example.com`)
//! ```
//!
//! Every backtick-quoted `Host(...)` argument in a matching rule is a
//! routable hostname. Rules without one contribute nothing.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use log::trace;
use regex::Regex;

/// Label prefix used by Traefik's HTTP routers.
pub const DEFAULT_ROUTER_PREFIX: &str = "traefik.http";

fn host_matcher() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Host\(`([^`]+)`\)").unwrap())
}

/// Derives the hostnames a container's labels route to.
#[derive(Debug, Clone)]
pub struct HostExtractor {
    router_rule: Regex,
}

impl HostExtractor {
    /// Matches `<prefix>.routers.<name>.rule` label keys.
    pub fn new(prefix: &str) -> Result<Self, regex::Error> {
        let pattern = format!(
            r"^{}\.routers\.([A-Za-z0-9._-]+)\.rule$",
            regex::escape(prefix)
        );
        Ok(Self {
            router_rule: Regex::new(&pattern)?,
        })
    }

    /// All hostnames across every router, in label order.
    ///
    /// Hosts declared by more than one router appear more than once.
    pub fn hosts(&self, labels: &BTreeMap<String, String>) -> Vec<String> {
        let mut hosts = Vec::new();

        for (key, rule) in labels {
            let Some(router) = self.router_rule.captures(key) else {
                continue;
            };

            let before = hosts.len();
            hosts.extend(
                host_matcher()
                    .captures_iter(rule)
                    .map(|captures| captures[1].to_string()),
            );
            trace!("Router {} declares {:?}", &router[1], &hosts[before..]);
        }

        hosts
    }
}

impl Default for HostExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTER_PREFIX).expect("escaped router prefix is a valid pattern")
    }
}

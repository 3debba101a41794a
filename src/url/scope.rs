use serde::Deserialize;
use std::collections::HashSet;

/// How discovered hosts are matched against the seed hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DomainScope {
    /// Only hosts that appeared in the seed list
    Exact,

    /// Any host sharing a seed's last two dot-separated labels
    ///
    /// This is a deliberate approximation, not a public-suffix-list lookup:
    /// `blog.example.com` and `shop.example.com` share `example.com`, but
    /// `example.co.uk` reduces to `co.uk` and so matches every `.co.uk`
    /// host. Channel configurations may rely on the looser behavior, so it
    /// is kept as-is.
    SecondLevel,
}

/// Decides which discovered hosts are in-bounds for a crawl
///
/// The allowed set derives from the seed hosts at construction time and
/// never grows during a run.
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    mode: DomainScope,
    allowed: HashSet<String>,
}

impl ScopeFilter {
    /// Builds a filter from the seed hosts.
    pub fn from_seed_hosts<'a, I>(mode: DomainScope, hosts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let allowed = hosts
            .into_iter()
            .map(|h| match mode {
                DomainScope::Exact => h.to_ascii_lowercase(),
                DomainScope::SecondLevel => second_level(h),
            })
            .collect();
        Self { mode, allowed }
    }

    /// Whether a discovered host falls inside the crawl scope.
    pub fn allows(&self, host: &str) -> bool {
        let key = match self.mode {
            DomainScope::Exact => host.to_ascii_lowercase(),
            DomainScope::SecondLevel => second_level(host),
        };
        self.allowed.contains(&key)
    }
}

/// Last two dot-separated labels of a hostname, lowercased.
///
/// Hosts with fewer than two labels (e.g. `localhost`, bare IPv4 octets are
/// fine) are returned whole.
fn second_level(host: &str) -> String {
    let host = host.to_ascii_lowercase();
    let labels: Vec<&str> = host.rsplitn(3, '.').collect();
    match labels.as_slice() {
        [tld, sld, _] | [tld, sld] => format!("{}.{}", sld, tld),
        _ => host,
    }
}

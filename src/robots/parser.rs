//! Tolerant robots.txt parser
//!
//! Parses the robots exclusion protocol line by line. Real-world robots.txt
//! files are frequently malformed; unparseable lines are skipped with a
//! warning and never abort the parse.

use crate::url::normalize_percent_encoding;
use url::Url;

/// One Allow/Disallow line, path already encoding-normalized
#[derive(Debug, Clone)]
struct RuleLine {
    allow: bool,
    path: String,
}

/// A Request-rate directive: at most `requests` per `seconds`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestRate {
    pub requests: u32,
    pub seconds: u32,
}

/// A block of rules under one or more User-agent lines
#[derive(Debug, Clone, Default)]
struct RuleGroup {
    agents: Vec<String>,
    rules: Vec<RuleLine>,
    crawl_delay: Option<f64>,
    request_rate: Option<RequestRate>,
}

impl RuleGroup {
    /// Specificity of this group for a user agent: the length of the
    /// longest agent token contained in the agent string, `0` for the `*`
    /// wildcard, `None` when the group does not apply at all.
    fn specificity(&self, agent_lower: &str) -> Option<usize> {
        let mut best = None;
        for token in &self.agents {
            if token == "*" {
                best = best.max(Some(0));
            } else if agent_lower.contains(token.as_str()) {
                best = best.max(Some(token.len()));
            }
        }
        best
    }
}

/// Parsed robots.txt rules for one domain
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    groups: Vec<RuleGroup>,
    sitemaps: Vec<String>,
}

impl RobotsRules {
    /// Parses robots.txt content, skipping malformed lines.
    pub fn parse(content: &str) -> Self {
        let mut groups: Vec<RuleGroup> = Vec::new();
        let mut sitemaps = Vec::new();
        // True while consecutive User-agent lines are still extending the
        // open group; any rule directive flips it
        let mut collecting_agents = false;

        for (line_no, raw_line) in content.lines().enumerate() {
            let line = match raw_line.split_once('#') {
                Some((before, _comment)) => before.trim(),
                None => raw_line.trim(),
            };
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                tracing::warn!(line = line_no + 1, content = line, "Skipping malformed robots.txt line");
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" | "useragent" => {
                    if value.is_empty() {
                        tracing::warn!(line = line_no + 1, "Skipping empty User-agent");
                        continue;
                    }
                    if !collecting_agents {
                        groups.push(RuleGroup::default());
                        collecting_agents = true;
                    }
                    if let Some(group) = groups.last_mut() {
                        group.agents.push(value.to_ascii_lowercase());
                    }
                }
                "allow" | "disallow" => {
                    collecting_agents = false;
                    // An empty Disallow means "no restriction"; an empty
                    // Allow is equally vacuous
                    if value.is_empty() {
                        continue;
                    }
                    let Some(group) = groups.last_mut() else {
                        tracing::warn!(line = line_no + 1, "Rule before any User-agent, skipping");
                        continue;
                    };
                    group.rules.push(RuleLine {
                        allow: key == "allow",
                        path: normalize_percent_encoding(value),
                    });
                }
                "crawl-delay" => {
                    collecting_agents = false;
                    match value.parse::<f64>() {
                        Ok(delay) if delay >= 0.0 => {
                            if let Some(group) = groups.last_mut() {
                                group.crawl_delay = Some(delay);
                            }
                        }
                        _ => {
                            tracing::warn!(line = line_no + 1, value, "Unparseable Crawl-delay")
                        }
                    }
                }
                "request-rate" => {
                    collecting_agents = false;
                    match parse_request_rate(value) {
                        Some(rate) => {
                            if let Some(group) = groups.last_mut() {
                                group.request_rate = Some(rate);
                            }
                        }
                        None => {
                            tracing::warn!(line = line_no + 1, value, "Unparseable Request-rate")
                        }
                    }
                }
                "sitemap" => {
                    // Sitemap is a standalone directive, valid outside any
                    // group; it does not close agent collection
                    if value.is_empty() {
                        tracing::warn!(line = line_no + 1, "Skipping empty Sitemap");
                    } else {
                        sitemaps.push(value.to_string());
                    }
                }
                _ => {
                    tracing::debug!(line = line_no + 1, directive = %key, "Ignoring unknown robots.txt directive");
                }
            }
        }

        Self { groups, sitemaps }
    }

    /// Rules that allow every path.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Rules that reject every path for every agent.
    pub fn disallow_all() -> Self {
        Self {
            groups: vec![RuleGroup {
                agents: vec!["*".to_string()],
                rules: vec![RuleLine {
                    allow: false,
                    path: "/".to_string(),
                }],
                crawl_delay: None,
                request_rate: None,
            }],
            sitemaps: Vec::new(),
        }
    }

    /// Checks whether `agent` may fetch `url`
    ///
    /// Only the path and query of the URL participate; both sides of the
    /// comparison are percent-normalized first. Within the selected group
    /// the longest matching rule path wins, with Allow beating Disallow on
    /// equal length. No matching group, or no matching rule, means allow.
    pub fn can_fetch(&self, agent: &str, url: &Url) -> bool {
        let Some(group) = self.group_for(agent) else {
            return true;
        };

        let mut target = normalize_percent_encoding(url.path());
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(&normalize_percent_encoding(query));
        }

        let mut verdict = true;
        let mut best_len = 0;
        for rule in &group.rules {
            if target.starts_with(&rule.path) {
                let len = rule.path.len();
                if len > best_len || (len == best_len && rule.allow) {
                    best_len = len;
                    verdict = rule.allow;
                }
            }
        }
        verdict
    }

    /// Crawl-delay in seconds for the given agent, if advertised.
    pub fn crawl_delay(&self, agent: &str) -> Option<f64> {
        self.group_for(agent).and_then(|g| g.crawl_delay)
    }

    /// Request-rate for the given agent, if advertised.
    pub fn request_rate(&self, agent: &str) -> Option<RequestRate> {
        self.group_for(agent).and_then(|g| g.request_rate)
    }

    /// Sitemap URLs listed anywhere in the file.
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    /// Selects the most specific group for an agent: the group whose agent
    /// token has the longest match, `*` as fallback.
    fn group_for(&self, agent: &str) -> Option<&RuleGroup> {
        let agent_lower = agent.to_ascii_lowercase();
        self.groups
            .iter()
            .filter_map(|g| g.specificity(&agent_lower).map(|s| (s, g)))
            .max_by_key(|(specificity, _)| *specificity)
            .map(|(_, g)| g)
    }
}

/// Parses `n/m` or `n/ms` Request-rate values, e.g. `1/5` or `1/5s`.
fn parse_request_rate(value: &str) -> Option<RequestRate> {
    let (requests, seconds) = value.split_once('/')?;
    let requests = requests.trim().parse().ok()?;
    let seconds = seconds.trim().trim_end_matches(['s', 'S']).parse().ok()?;
    if requests == 0 || seconds == 0 {
        return None;
    }
    Some(RequestRate { requests, seconds })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://example.com{}", path)).unwrap()
    }

    #[test]
    fn test_empty_allows_everything() {
        let rules = RobotsRules::parse("");
        assert!(rules.can_fetch("TestBot", &url("/anything")));
    }

    #[test]
    fn test_basic_disallow() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /private");
        assert!(!rules.can_fetch("TestBot", &url("/private/page")));
        assert!(rules.can_fetch("TestBot", &url("/public")));
    }

    #[test]
    fn test_allow_overrides_disallow_on_longer_prefix() {
        let rules =
            RobotsRules::parse("User-agent: *\nDisallow: /shop\nAllow: /shop/public");
        assert!(!rules.can_fetch("TestBot", &url("/shop/cart")));
        assert!(rules.can_fetch("TestBot", &url("/shop/public/list")));
    }

    #[test]
    fn test_allow_wins_tie() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /a\nAllow: /a");
        assert!(rules.can_fetch("TestBot", &url("/a/page")));
    }

    #[test]
    fn test_specific_agent_group_wins() {
        let rules = RobotsRules::parse(
            "User-agent: SkimBot\nDisallow: /only-for-skim\n\nUser-agent: *\nDisallow: /everyone",
        );
        // SkimBot gets its own group, which says nothing about /everyone
        assert!(!rules.can_fetch("SkimBot/1.0", &url("/only-for-skim")));
        assert!(rules.can_fetch("SkimBot/1.0", &url("/everyone")));
        assert!(!rules.can_fetch("OtherBot", &url("/everyone")));
    }

    #[test]
    fn test_multiple_agents_share_group() {
        let rules =
            RobotsRules::parse("User-agent: A\nUser-agent: B\nDisallow: /x");
        assert!(!rules.can_fetch("A", &url("/x/1")));
        assert!(!rules.can_fetch("B", &url("/x/1")));
        assert!(rules.can_fetch("C", &url("/x/1")));
    }

    #[test]
    fn test_agent_after_rules_starts_new_group() {
        let rules = RobotsRules::parse(
            "User-agent: A\nDisallow: /a\nUser-agent: B\nDisallow: /b",
        );
        assert!(!rules.can_fetch("A", &url("/a")));
        assert!(rules.can_fetch("A", &url("/b")));
        assert!(!rules.can_fetch("B", &url("/b")));
    }

    #[test]
    fn test_empty_disallow_means_allow() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow:");
        assert!(rules.can_fetch("TestBot", &url("/anything")));
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let rules = RobotsRules::parse(
            "this is not a directive\nUser-agent: *\n<<<garbage>>>\nDisallow: /private\n%%%",
        );
        assert!(!rules.can_fetch("TestBot", &url("/private")));
        assert!(rules.can_fetch("TestBot", &url("/ok")));
    }

    #[test]
    fn test_comments_stripped() {
        let rules =
            RobotsRules::parse("# header\nUser-agent: * # everyone\nDisallow: /x # why not");
        assert!(!rules.can_fetch("TestBot", &url("/x")));
    }

    #[test]
    fn test_crawl_delay_per_agent() {
        let rules = RobotsRules::parse(
            "User-agent: SkimBot\nCrawl-delay: 10\n\nUser-agent: *\nCrawl-delay: 2",
        );
        assert_eq!(rules.crawl_delay("SkimBot/1.0"), Some(10.0));
        assert_eq!(rules.crawl_delay("OtherBot"), Some(2.0));
    }

    #[test]
    fn test_request_rate() {
        let rules = RobotsRules::parse("User-agent: *\nRequest-rate: 1/5");
        assert_eq!(
            rules.request_rate("TestBot"),
            Some(RequestRate {
                requests: 1,
                seconds: 5
            })
        );
    }

    #[test]
    fn test_sitemap_directives_collected() {
        let rules = RobotsRules::parse(
            "Sitemap: https://example.com/sitemap.xml\nUser-agent: *\nDisallow: /x\nSitemap: https://example.com/news.xml",
        );
        assert_eq!(rules.sitemaps().len(), 2);
    }

    #[test]
    fn test_percent_encoding_normalized() {
        // %7E is '~', unreserved on both sides of the comparison
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /%7Eprivate");
        assert!(!rules.can_fetch("TestBot", &url("/~private/files")));
    }

    #[test]
    fn test_query_participates_in_matching() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /search?q=");
        assert!(!rules.can_fetch("TestBot", &Url::parse("https://example.com/search?q=x").unwrap()));
        assert!(rules.can_fetch("TestBot", &url("/search")));
    }

    #[test]
    fn test_disallow_all_constructor() {
        let rules = RobotsRules::disallow_all();
        assert!(!rules.can_fetch("AnyBot", &url("/")));
        assert!(!rules.can_fetch("AnyBot", &url("/deep/page")));
    }

    #[test]
    fn test_bad_crawl_delay_ignored() {
        let rules = RobotsRules::parse("User-agent: *\nCrawl-delay: soon\nDisallow: /x");
        assert_eq!(rules.crawl_delay("TestBot"), None);
        assert!(!rules.can_fetch("TestBot", &url("/x")));
    }
}

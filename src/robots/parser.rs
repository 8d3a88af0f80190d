//! Robots.txt parser implementation
//!
//! Allow/Disallow matching is delegated to the robotstxt crate; the directives it
//! does not expose (`Sitemap`, `Crawl-delay`) are read here.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    content: String,
    sitemaps: Vec<String>,
    groups: Vec<AgentGroup>,
}

/// A run of `User-agent` lines and the directives that follow them
#[derive(Debug, Clone, Default)]
struct AgentGroup {
    agents: Vec<String>,
    crawl_delay: Option<f64>,
    has_rules: bool,
}

impl ParsedRobots {
    /// Parses raw robots.txt content
    ///
    /// Never fails: unknown lines are ignored, so garbage parses as "allow all".
    pub fn from_content(content: &str) -> Self {
        let mut sitemaps = Vec::new();
        let mut groups: Vec<AgentGroup> = Vec::new();

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "user-agent" => {
                    let start_new = groups
                        .last()
                        .map_or(true, |g| g.has_rules || g.crawl_delay.is_some());
                    if start_new {
                        groups.push(AgentGroup::default());
                    }
                    if let Some(group) = groups.last_mut() {
                        group.agents.push(value.to_ascii_lowercase());
                    }
                }
                "allow" | "disallow" => {
                    if let Some(group) = groups.last_mut() {
                        group.has_rules = true;
                    }
                }
                "crawl-delay" => {
                    if let (Some(group), Ok(delay)) = (groups.last_mut(), value.parse::<f64>()) {
                        group.crawl_delay = Some(delay);
                    }
                }
                "sitemap" if !value.is_empty() => sitemaps.push(value.to_string()),
                _ => {}
            }
        }

        Self {
            content: content.to_string(),
            sitemaps,
            groups,
        }
    }

    /// Checks if a URL may be fetched by the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - An absolute URL; only its path and query are matched
    /// * `user_agent` - The crawler's product token, e.g. `Googlebot`
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// True when the site root is disallowed for `user_agent`
    pub fn blocks_everything(&self, user_agent: &str) -> bool {
        !self.is_allowed("http://localhost/", user_agent)
    }

    /// `Sitemap:` URLs in file order
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    /// Gets the crawl delay (seconds) that applies to `user_agent`
    ///
    /// A group naming the agent wins over the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        let agent = user_agent.to_ascii_lowercase();
        let specific = self.groups.iter().find(|g| {
            g.agents
                .iter()
                .any(|a| a != "*" && !a.is_empty() && agent.contains(a.as_str()))
        });
        let group = specific.or_else(|| {
            self.groups
                .iter()
                .find(|g| g.agents.iter().any(|a| a == "*"))
        })?;
        group.crawl_delay
    }
}

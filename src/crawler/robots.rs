//! robots.txt parsing.
//!
//! Line-based parser covering User-agent groups, Allow/Disallow rules with
//! longest-match precedence, Crawl-delay, and Sitemap directives. Absence of
//! a robots.txt (or a failed fetch) is treated as allow-all.

/// One Allow/Disallow rule.
#[derive(Debug, Clone)]
struct Rule {
    allow: bool,
    /// Path prefix; a trailing `*` is tolerated and stripped.
    path: String,
}

/// Parsed robots rules applicable to our user agent.
#[derive(Debug, Clone)]
pub struct RobotsRules {
    rules: Vec<Rule>,
    crawl_delay_secs: Option<f64>,
    sitemaps: Vec<String>,
}

impl RobotsRules {
    /// Rules that allow everything (no robots.txt present).
    pub fn allow_all() -> Self {
        Self {
            rules: Vec::new(),
            crawl_delay_secs: None,
            sitemaps: Vec::new(),
        }
    }

    /// Parse robots.txt content for the given user-agent token.
    ///
    /// Groups naming the token (substring match, case-insensitive) take
    /// precedence over `*` groups; `*` groups apply otherwise. Sitemap
    /// directives are global and collected regardless of group.
    pub fn parse(text: &str, user_agent_token: &str) -> Self {
        let token = user_agent_token.to_lowercase();

        let mut sitemaps = Vec::new();
        let mut specific: Vec<Rule> = Vec::new();
        let mut specific_delay = None;
        let mut wildcard: Vec<Rule> = Vec::new();
        let mut wildcard_delay = None;

        // Whether the current group applies to us / to everyone.
        let mut in_specific = false;
        let mut in_wildcard = false;
        let mut matched_specific = false;
        // A rule line ends the group header; the next User-agent starts a new group.
        let mut seen_rule_in_group = false;

        for raw_line in text.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    if seen_rule_in_group {
                        in_specific = false;
                        in_wildcard = false;
                        seen_rule_in_group = false;
                    }
                    let agent = value.to_lowercase();
                    if agent == "*" {
                        in_wildcard = true;
                    } else if token.contains(&agent) {
                        in_specific = true;
                        matched_specific = true;
                    }
                }
                "allow" | "disallow" => {
                    seen_rule_in_group = true;
                    // An empty Disallow means allow-all; record nothing.
                    if value.is_empty() {
                        continue;
                    }
                    let rule = Rule {
                        allow: field == "allow",
                        path: value.trim_end_matches('*').to_string(),
                    };
                    if in_specific {
                        specific.push(rule.clone());
                    }
                    if in_wildcard {
                        wildcard.push(rule);
                    }
                }
                "crawl-delay" => {
                    seen_rule_in_group = true;
                    let delay = value.parse::<f64>().ok();
                    if in_specific {
                        specific_delay = specific_delay.or(delay);
                    }
                    if in_wildcard {
                        wildcard_delay = wildcard_delay.or(delay);
                    }
                }
                "sitemap" => {
                    if !value.is_empty() {
                        sitemaps.push(value.to_string());
                    }
                }
                _ => {}
            }
        }

        if !matched_specific {
            Self {
                rules: wildcard,
                crawl_delay_secs: wildcard_delay,
                sitemaps,
            }
        } else {
            Self {
                rules: specific,
                crawl_delay_secs: specific_delay,
                sitemaps,
            }
        }
    }

    /// Whether fetching `path` is allowed. Longest matching rule wins; ties
    /// go to Allow; no match means allowed.
    pub fn is_allowed(&self, path: &str) -> bool {
        let path = if path.is_empty() { "/" } else { path };

        let mut best_len = 0usize;
        let mut best_allow = true;
        for rule in &self.rules {
            if path.starts_with(&rule.path) {
                let len = rule.path.len();
                if len > best_len || (len == best_len && rule.allow) {
                    best_len = len;
                    best_allow = rule.allow;
                }
            }
        }
        best_allow
    }

    /// Crawl-delay directive, if present.
    pub fn crawl_delay_secs(&self) -> Option<f64> {
        self.crawl_delay_secs
    }

    /// Sitemap URLs declared in robots.txt.
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = r#"
# comments are ignored
User-agent: *
Disallow: /admin/
Disallow: /cart
Allow: /admin/help
Crawl-delay: 2
Sitemap: https://example.com/sitemap.xml

User-agent: badbot
Disallow: /
"#;

    #[test]
    fn wildcard_group_applies() {
        let rules = RobotsRules::parse(ROBOTS, "siteintel/0.4");
        assert!(rules.is_allowed("/"));
        assert!(rules.is_allowed("/products"));
        assert!(!rules.is_allowed("/admin/"));
        assert!(!rules.is_allowed("/admin/users"));
        assert!(!rules.is_allowed("/cart"));
        assert_eq!(rules.crawl_delay_secs(), Some(2.0));
        assert_eq!(rules.sitemaps(), &["https://example.com/sitemap.xml"]);
    }

    #[test]
    fn longest_match_allow_wins() {
        let rules = RobotsRules::parse(ROBOTS, "siteintel/0.4");
        // /admin/help is the longer Allow match inside the disallowed /admin/.
        assert!(rules.is_allowed("/admin/help"));
        assert!(rules.is_allowed("/admin/help/faq"));
    }

    #[test]
    fn specific_group_overrides_wildcard() {
        let rules = RobotsRules::parse(ROBOTS, "badbot/1.0");
        assert!(!rules.is_allowed("/"));
        assert!(!rules.is_allowed("/anything"));
    }

    #[test]
    fn empty_disallow_allows_everything() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow:\n", "siteintel");
        assert!(rules.is_allowed("/anything"));
    }

    #[test]
    fn missing_robots_allows_all() {
        let rules = RobotsRules::allow_all();
        assert!(rules.is_allowed("/admin/"));
        assert_eq!(rules.crawl_delay_secs(), None);
    }

    #[test]
    fn trailing_wildcard_stripped() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /private*\n", "siteintel");
        assert!(!rules.is_allowed("/private"));
        assert!(!rules.is_allowed("/private-data"));
        assert!(rules.is_allowed("/public"));
    }
}

use tracing::warn;

use crate::rule::{OriginRule, RuleError};

/// Compiled allow-list used to admit cross-origin requests.
///
/// Compilation is best effort: a wildcard entry that fails to compile is
/// logged and left out, and the remaining entries still apply. An empty
/// origin (sent by non-browser clients) is always admitted.
#[derive(Debug, Clone, Default)]
pub struct OriginMatcher {
    allow_any: bool,
    literals: Vec<String>,
    patterns: Vec<OriginRule>,
    rejected: Vec<RuleError>,
}

impl OriginMatcher {
    pub fn compile<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matcher = Self::default();
        for entry in origins {
            match OriginRule::parse(entry.as_ref()) {
                Ok(OriginRule::Any) => matcher.allow_any = true,
                Ok(OriginRule::Literal(literal)) => matcher.literals.push(literal),
                Ok(rule) => matcher.patterns.push(rule),
                Err(e) => {
                    warn!("Skipping origin rule: {}", e);
                    matcher.rejected.push(e);
                }
            }
        }
        matcher
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        if origin.is_empty() || self.allow_any {
            return true;
        }
        if self.literals.iter().any(|literal| literal == origin) {
            return true;
        }
        self.patterns.iter().any(|rule| rule.matches(origin))
    }

    /// True when the bare `*` entry was configured.
    pub fn allows_any(&self) -> bool {
        self.allow_any
    }

    /// Number of entries that made it into the matcher.
    pub fn rule_count(&self) -> usize {
        usize::from(self.allow_any) + self.literals.len() + self.patterns.len()
    }

    /// Wildcard entries that were dropped during compilation.
    pub fn rejected(&self) -> &[RuleError] {
        &self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_matcher() -> OriginMatcher {
        OriginMatcher::compile([
            "http://localhost:3000",
            "https://*.domain.com",
            "http://localhost:*",
        ])
    }

    #[test]
    fn test_reference_allow_list() {
        let m = reference_matcher();
        let cases = [
            ("", true),
            ("http://localhost:3000", true),
            ("https://app.domain.com", true),
            ("https://v1.api.domain.com", true),
            ("https://domain.com.evil.com", false),
            ("http://localhost:8080", true),
            ("http://localhost:5173", true),
            ("http://otherhost:8080", false),
            ("https://google.com", false),
        ];
        for (origin, expected) in cases {
            assert_eq!(m.is_allowed(origin), expected, "origin {:?}", origin);
        }
    }

    #[test]
    fn test_empty_origin_always_allowed() {
        assert!(OriginMatcher::compile(Vec::<String>::new()).is_allowed(""));
        assert!(OriginMatcher::compile(["https://only.example"]).is_allowed(""));
    }

    #[test]
    fn test_empty_allow_list_rejects_browser_origins() {
        let m = OriginMatcher::compile(Vec::<&str>::new());
        assert!(!m.is_allowed("http://localhost:3000"));
        assert_eq!(m.rule_count(), 0);
    }

    #[test]
    fn test_star_allows_everything() {
        let m = OriginMatcher::compile(["http://localhost:3000", "*"]);
        assert!(m.allows_any());
        assert!(m.is_allowed("https://anything.at.all"));
        assert!(m.is_allowed("null"));
    }

    #[test]
    fn test_literal_only_list() {
        let m = OriginMatcher::compile(["http://localhost:3000"]);
        assert!(m.is_allowed("http://localhost:3000"));
        assert!(!m.is_allowed("http://localhost:8080"));
        assert!(!m.is_allowed("https://evil.com"));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let m = OriginMatcher::compile(["https://*.Domain.com"]);
        assert!(m.is_allowed("https://app.Domain.com"));
        assert!(!m.is_allowed("https://app.domain.com"));
    }

    #[test]
    fn test_invalid_pattern_is_skipped_not_fatal() {
        let huge = format!("https://{}", "x*".repeat(5_000));
        let m = OriginMatcher::compile([huge.as_str(), "http://localhost:*"]);
        assert_eq!(m.rejected().len(), 1);
        assert_eq!(m.rule_count(), 1);
        assert!(m.is_allowed("http://localhost:9999"));
        assert!(!m.is_allowed("https://xx"));
    }

    #[test]
    fn test_order_does_not_change_verdict() {
        let forward = reference_matcher();
        let backward = OriginMatcher::compile([
            "http://localhost:*",
            "https://*.domain.com",
            "http://localhost:3000",
        ]);
        for origin in [
            "http://localhost:3000",
            "https://a.domain.com",
            "https://domain.com.evil.com",
            "http://otherhost:1",
        ] {
            assert_eq!(forward.is_allowed(origin), backward.is_allowed(origin));
        }
    }
}

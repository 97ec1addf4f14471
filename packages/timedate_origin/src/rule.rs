use regex::{Regex, RegexBuilder};

/// The allow-list entry that admits every origin.
pub const ANY_ORIGIN: &str = "*";

/// Upper bound on the compiled size of a single wildcard pattern.
pub const PATTERN_SIZE_LIMIT: usize = 64 * 1024;

/// One compiled allow-list entry.
#[derive(Debug, Clone)]
pub enum OriginRule {
    /// The bare `*` entry.
    Any,
    /// Compared byte for byte against the request origin.
    Literal(String),
    /// An entry containing `*`, anchored at both ends.
    Pattern { source: String, regex: Regex },
}

/// A wildcard entry that could not be compiled.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid origin pattern {entry:?}: {reason}")]
pub struct RuleError {
    pub entry: String,
    pub reason: String,
}

impl OriginRule {
    pub fn parse(entry: &str) -> Result<Self, RuleError> {
        if entry == ANY_ORIGIN {
            return Ok(Self::Any);
        }
        if !entry.contains('*') {
            return Ok(Self::Literal(entry.to_string()));
        }

        let regex = RegexBuilder::new(&wildcard_to_regex(entry))
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()
            .map_err(|e| RuleError {
                entry: entry.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self::Pattern {
            source: entry.to_string(),
            regex,
        })
    }

    pub fn matches(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Literal(literal) => literal == origin,
            Self::Pattern { regex, .. } => regex.is_match(origin),
        }
    }

    /// The allow-list entry this rule was compiled from.
    pub fn source(&self) -> &str {
        match self {
            Self::Any => ANY_ORIGIN,
            Self::Literal(literal) => literal,
            Self::Pattern { source, .. } => source,
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, Self::Pattern { .. })
    }
}

/// Translate a wildcard entry into an anchored regular expression.
///
/// Everything except `*` is escaped, so `.` in a host name stays a literal dot.
pub fn wildcard_to_regex(entry: &str) -> String {
    let body = entry
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("^{}$", body)
}

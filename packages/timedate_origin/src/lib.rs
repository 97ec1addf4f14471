//! Cross-origin admission rules for timedate.
//!
//! An allow-list entry is either a literal origin (`http://localhost:3000`), the
//! catch-all `*`, or a pattern where each `*` stands for any run of characters
//! (`https://*.example.com`, `http://localhost:*`). The compiled
//! [`OriginMatcher`] is immutable and can be shared freely between connections.

pub mod matcher;
pub mod rule;

pub use matcher::OriginMatcher;
pub use rule::{ANY_ORIGIN, OriginRule, RuleError};

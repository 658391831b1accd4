//! Glob-style key patterns (`*` and `?`) shared by both cache tiers.
//!
//! Every other character is literal, including the `[`, `]` and `\` that
//! Redis `MATCH` would otherwise read as glob syntax.

use regex::Regex;

use super::CacheError;

#[derive(Clone, Debug)]
pub struct GlobPattern {
    raw: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, CacheError> {
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');
        for ch in pattern.chars() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(&other.to_string())),
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr)
            .map_err(|e| CacheError::Codec(format!("invalid pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_match_all(&self) -> bool {
        self.raw == "*"
    }

    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    /// The pattern in Redis `SCAN MATCH` syntax, matching the same keys as
    /// [`matches`](Self::matches).
    pub fn redis_match(&self) -> String {
        let mut out = String::with_capacity(self.raw.len() + 4);
        for ch in self.raw.chars() {
            if matches!(ch, '[' | ']' | '\\') {
                out.push('\\');
            }
            out.push(ch);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_pattern() {
        let pattern = GlobPattern::new("hist:*").unwrap();
        assert!(pattern.matches("hist:BTC:90"));
        assert!(!pattern.matches("historical:BTC:90"));
        assert!(!pattern.matches("quote:hist:BTC"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let pattern = GlobPattern::new("quote:B.C").unwrap();
        assert!(pattern.matches("quote:B.C"));
        assert!(!pattern.matches("quote:BTC"));

        let single = GlobPattern::new("quote:?TC").unwrap();
        assert!(single.matches("quote:BTC"));
    }

    #[test]
    fn test_brackets_and_backslash_are_literal() {
        let pattern = GlobPattern::new("quote:[AB]*").unwrap();
        assert!(pattern.matches("quote:[AB]TC"));
        assert!(!pattern.matches("quote:ATC"));
        assert_eq!(pattern.redis_match(), r"quote:\[AB\]*");

        let pattern = GlobPattern::new(r"a\b?").unwrap();
        assert!(pattern.matches(r"a\bc"));
        assert_eq!(pattern.redis_match(), r"a\\b?");

        assert_eq!(GlobPattern::new("hist:*").unwrap().redis_match(), "hist:*");
    }

    #[test]
    fn test_match_all() {
        let pattern = GlobPattern::new("*").unwrap();
        assert!(pattern.is_match_all());
        assert!(pattern.matches(""));
        assert!(pattern.matches("batch:preload_all_market_data"));
    }
}

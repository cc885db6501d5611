use globset::{GlobBuilder, GlobMatcher};

use crate::error::FilterError;

/// Glob restricting which multiplexer sessions are visible.
///
/// Uses shell-glob semantics (`*`, `?`, `[...]`). An empty pattern admits
/// every session.
#[derive(Clone, Debug)]
pub struct SessionFilter {
    pattern: String,
    matcher: Option<GlobMatcher>,
}

impl SessionFilter {
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        if pattern.is_empty() {
            return Ok(Self::allow_all());
        }

        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|source| FilterError {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            pattern: pattern.to_string(),
            matcher: Some(glob.compile_matcher()),
        })
    }

    /// Filter that admits every session.
    pub fn allow_all() -> Self {
        Self {
            pattern: String::new(),
            matcher: None,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, session: &str) -> bool {
        match &self.matcher {
            Some(matcher) => matcher.is_match(session),
            None => true,
        }
    }
}

impl Default for SessionFilter {
    fn default() -> Self {
        Self::allow_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(session: &str, pattern: &str) -> bool {
        SessionFilter::new(pattern).unwrap().matches(session)
    }

    #[test]
    fn test_glob_table() {
        let cases = [
            ("gt-main", "gt-*", true),
            ("gt-work", "gt-*", true),
            ("other", "gt-*", false),
            ("anything", "", true),
            ("gt-main", "gt-main", true),
            ("gt-main", "gt-work", false),
            ("gt-1", "gt-?", true),
            ("gt-12", "gt-?", false),
            ("gt-a", "gt-[ab]", true),
            ("gt-c", "gt-[ab]", false),
        ];

        for (session, pattern, want) in cases {
            assert_eq!(
                matches(session, pattern),
                want,
                "matches({session:?}, {pattern:?})"
            );
        }
    }

    #[test]
    fn test_star_does_not_cross_separator() {
        assert!(!matches("gt/main", "gt*"));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = SessionFilter::new("gt-[").unwrap_err();
        assert_eq!(err.pattern, "gt-[");
    }

    #[test]
    fn test_allow_all_default() {
        let filter = SessionFilter::default();
        assert_eq!(filter.pattern(), "");
        assert!(filter.matches(""));
        assert!(filter.matches("whatever"));
    }
}

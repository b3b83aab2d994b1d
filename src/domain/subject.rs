//! Subject identities: the GitHub login whose event stream is fetched.
//!
//! Logins are 1 to 39 ASCII alphanumerics or single hyphens and may not start
//! or end with a hyphen. Anything else can never name an upstream account, so
//! it is rejected before a request is issued.

use std::fmt;

use thiserror::Error;

const MAX_LEN: usize = 39;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubjectError {
    #[error("subject is empty")]
    Empty,
    #[error("subject `{input}` is not a valid login")]
    Invalid { input: String },
}

/// A syntactically valid login, preserving the caller's casing for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subject(String);

impl Subject {
    pub fn parse(input: &str) -> Result<Self, SubjectError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SubjectError::Empty);
        }

        let well_formed = trimmed.len() <= MAX_LEN
            && !trimmed.starts_with('-')
            && !trimmed.ends_with('-')
            && !trimmed.contains("--")
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-');

        if !well_formed {
            return Err(SubjectError::Invalid {
                input: input.to_string(),
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Logins are case-insensitive upstream, so cache entries are keyed by lowercase.
    pub fn cache_key(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_logins() {
        for login in ["octocat", "a", "mona-lisa", "A1-b2-C3", &"x".repeat(39)] {
            assert_eq!(Subject::parse(login).expect("valid").as_str(), login);
        }
    }

    #[test]
    fn rejects_malformed_logins() {
        assert_eq!(Subject::parse("  "), Err(SubjectError::Empty));
        for login in ["-lead", "trail-", "dou--ble", "dots.are.bad", "with space", "ünï", &"x".repeat(40)] {
            assert!(
                matches!(Subject::parse(login), Err(SubjectError::Invalid { .. })),
                "{login} should be rejected"
            );
        }
    }

    #[test]
    fn cache_key_is_case_insensitive() {
        let upper = Subject::parse("OctoCat").expect("valid");
        let lower = Subject::parse("octocat").expect("valid");
        assert_eq!(upper.cache_key(), lower.cache_key());
        assert_eq!(upper.to_string(), "OctoCat");
    }
}

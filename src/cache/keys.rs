//! Cache key families.
//!
//! Each (subject, page) pair owns two independently expiring keys: the event
//! list body and the revalidation token issued with it.

use std::fmt;

use crate::domain::Subject;

const PREFIX: &str = "events";
const TOKEN_SUFFIX: &str = "etag";

/// Identifies the cached upstream response for one page of one subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    body: String,
}

impl CacheKey {
    pub fn events(subject: &Subject, page: u32) -> Self {
        Self {
            body: format!("{PREFIX}:{}:p{page}", subject.cache_key()),
        }
    }

    /// Key holding the raw event list body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Key holding the revalidation token for the body.
    pub fn token(&self) -> String {
        format!("{}:{TOKEN_SUFFIX}", self.body)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.body)
    }
}

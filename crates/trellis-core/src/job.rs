//! Job identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a job identifier.
const MAX_JOB_ID_LEN: usize = 128;

/// A validated job identifier, assigned by the Core compute service.
///
/// Job ids name filesystem artifacts directly (`{job_id}.json`), so the
/// accepted charset is the safety mechanism: ids are single path segments
/// and can never contain separators or traversal components.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Parse and validate a job identifier.
    ///
    /// Accepts 1..=128 chars of `[A-Za-z0-9._-]`, rejecting a leading dot
    /// (hidden/relative names) and therefore any `..` component.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Err(crate::Error::InvalidJobId("empty".to_string()));
        }
        if s.len() > MAX_JOB_ID_LEN {
            return Err(crate::Error::InvalidJobId(format!(
                "length {} exceeds maximum {}",
                s.len(),
                MAX_JOB_ID_LEN
            )));
        }
        if s.starts_with('.') {
            return Err(crate::Error::InvalidJobId(format!(
                "must not start with '.': {s}"
            )));
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(crate::Error::InvalidJobId(format!(
                "invalid character {c:?} in {s}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for JobId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for JobId {
    type Error = crate::Error;

    fn try_from(s: String) -> crate::Result<Self> {
        Self::parse(&s)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({})", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

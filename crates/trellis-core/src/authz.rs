//! Upload authorization.

use crate::job::JobId;

/// Outcome of an authorization check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Decide whether a caller holding a grant for `claim` may upload the
/// result of the job addressed by `path`.
///
/// Deliberately a pure function over the two identifiers, independent of
/// any transport: the caller must match the addressed job exactly.
pub fn authorize(claim: &JobId, path: &JobId) -> Decision {
    if claim == path {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_ids_allow() {
        let a = JobId::parse("job-1").unwrap();
        let b = JobId::parse("job-1").unwrap();
        assert_eq!(authorize(&a, &b), Decision::Allow);
    }

    #[test]
    fn test_mismatched_ids_deny() {
        let a = JobId::parse("job-1").unwrap();
        let b = JobId::parse("job-2").unwrap();
        assert_eq!(authorize(&a, &b), Decision::Deny);
    }
}

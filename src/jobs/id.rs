//! # Job identifiers.
//!
//! A [`JobId`] is minted once per submission and used as the join key across the
//! registry, the bus and the log directory (`<log_dir>/<job_id>.log`).

use std::{fmt, str::FromStr, sync::Arc};

use rand::Rng;

use crate::error::RuntimeError;

/// Opaque, globally unique job identifier.
///
/// Cheap to clone (`Arc<str>` inside). Freshly minted ids are 16 lowercase hex
/// characters drawn from the thread-local CSPRNG.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(Arc<str>);

impl JobId {
    /// Mints a new random identifier.
    pub fn generate() -> Self {
        let raw: u64 = rand::rng().random();
        Self(format!("{raw:016x}").into())
    }

    /// Borrowed string form.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_safe(s: &str) -> bool {
        !s.is_empty()
            && s
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    }
}

impl FromStr for JobId {
    type Err = RuntimeError;

    /// Accepts ids coming back from outside (dashboards, CLIs).
    ///
    /// Only `[A-Za-z0-9_-]+` is accepted since the id becomes a file name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Self::is_safe(s) {
            Ok(Self(s.into()))
        } else {
            Err(RuntimeError::InvalidJobId { id: s.to_string() })
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({})", self.0)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_id_is_16_hex_chars() {
        let id = JobId::generate();
        assert_eq!(id.as_str().len(), 16);
        assert!(id.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let ids: HashSet<JobId> = (0..1000).map(|_| JobId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_parse_accepts_filesystem_safe_tokens() {
        let id: JobId = "a1b2-c3_d4".parse().unwrap();
        assert_eq!(id.to_string(), "a1b2-c3_d4");
    }

    #[test]
    fn test_parse_rejects_path_like_input() {
        for bad in ["", "../etc", "a/b", "x y", "id.log"] {
            let err = bad.parse::<JobId>().unwrap_err();
            assert_eq!(err.as_label(), "runtime_invalid_job_id", "input {bad:?}");
        }
    }
}

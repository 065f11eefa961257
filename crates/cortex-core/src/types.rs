use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Opaque session tag carried on messages and memory records.
///
/// Unlike a user/channel-scoped session key, this is just a caller-supplied
/// label used to group related turns — the orchestrator is otherwise stateless.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionTag(pub String);

impl SessionTag {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionTag {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionTag {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

static RECORD_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Collision-resistant record identifier: `{epoch_ms}-{process_local_counter}`.
///
/// Two records created within the same millisecond in the same process get
/// distinct ids via the counter; across processes the epoch component alone
/// already separates almost all writes, and ids are never compared cross-process
/// for ordering purposes, only for uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(epoch_ms: i64) -> Self {
        let counter = RECORD_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("{}-{}", epoch_ms, counter))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_ids_within_same_millisecond_are_distinct() {
        let a = RecordId::new(1_700_000_000_000);
        let b = RecordId::new(1_700_000_000_000);
        assert_ne!(a, b);
    }
}

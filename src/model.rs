//! Data model shared by every node of a transaction tree
//!
//! A transaction is identified by a single `TransactionId` carried by the
//! whole tree; the id never addresses individual nodes (tree structure does
//! that). Participants vote with a `ReadinessReport` and the root answers
//! with a `Decision`.

use std::fmt;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Progress percentage, valid within `0.0..=100.0`.
pub type Percent = f64;

/// Opaque identity shared by every node of one transaction's tree.
///
/// Stable and hashable so participants can key per-transaction state on it
/// (staged change sets, duplicate-attempt guards). Serializes as its inner
/// string, which keeps it usable as a JSON map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

/// Generates ids of the form `YYYYMMDD_HHMMSS_<seq>_<site>`.
///
/// The sequence counter distinguishes ids generated within the same
/// wall-clock second and resets when the second changes. The counter is
/// mutex-guarded so concurrent `generate` calls never reuse a sequence
/// number.
pub struct TransactionIdGenerator {
    site: String,
    state: Mutex<GeneratorState>,
}

#[derive(Default)]
struct GeneratorState {
    sequence: u32,
    current_second: i64,
}

impl TransactionIdGenerator {
    /// Create a generator tagged with `site`, typically a short name of the
    /// process or service initiating transactions.
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            state: Mutex::new(GeneratorState::default()),
        }
    }

    /// Create a generator with a random 8-character site tag.
    pub fn with_random_site() -> Self {
        let tag = Uuid::new_v4().simple().to_string();
        Self::new(&tag[..8])
    }

    pub fn generate(&self) -> TransactionId {
        let now = Utc::now();
        let second = now.timestamp();
        let mut state = self.state.lock();
        if second != state.current_second {
            state.current_second = second;
            state.sequence = 0;
        }
        let sequence = state.sequence;
        state.sequence += 1;
        TransactionId(format!(
            "{}_{}_{}",
            now.format("%Y%m%d_%H%M%S"),
            sequence,
            self.site
        ))
    }
}

/// Final outcome broadcast from the root to every node of the tree.
///
/// "Not decided yet" is `None` at the signal's poll surface, not a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Commit,
    Rollback,
}

/// A contributor's vote on whether the transaction may commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub can_commit: bool,
    pub message: Option<String>,
}

impl ReadinessReport {
    pub fn new(can_commit: bool, message: Option<String>) -> Self {
        Self {
            can_commit,
            message,
        }
    }

    pub fn to_decision(&self) -> Decision {
        if self.can_commit {
            Decision::Commit
        } else {
            Decision::Rollback
        }
    }
}

impl fmt::Display for ReadinessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(can_commit: {}, message: '{}')",
            self.can_commit,
            self.message.as_deref().unwrap_or("")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn generated_ids_are_unique_and_tagged() {
        let generator = TransactionIdGenerator::new("site-a");
        let a = generator.generate();
        let b = generator.generate();
        let c = generator.generate();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
        assert!(a.as_str().ends_with("_site-a"));
    }

    #[test]
    fn id_format_has_timestamp_sequence_and_site() {
        let generator = TransactionIdGenerator::new("demo");
        let id = generator.generate();
        let parts: Vec<&str> = id.as_str().split('_').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0].len(), 8); // YYYYMMDD
        assert_eq!(parts[1].len(), 6); // HHMMSS
        assert!(parts[2].parse::<u32>().is_ok());
        assert_eq!(parts[3], "demo");
    }

    #[test]
    fn random_site_tags_differ() {
        let a = TransactionIdGenerator::with_random_site().generate();
        let b = TransactionIdGenerator::with_random_site().generate();
        assert_ne!(
            a.as_str().rsplit('_').next(),
            b.as_str().rsplit('_').next()
        );
    }

    #[test]
    fn display_uses_tid_prefix() {
        let id = TransactionId::new("x");
        assert_eq!(id.to_string(), "TID:x");
    }

    #[test]
    fn report_maps_to_decision() {
        assert_eq!(
            ReadinessReport::new(true, None).to_decision(),
            Decision::Commit
        );
        assert_eq!(
            ReadinessReport::new(false, Some("out of funds".into())).to_decision(),
            Decision::Rollback
        );
    }

    #[test]
    fn id_works_as_json_map_key() {
        let mut staged = std::collections::HashMap::new();
        staged.insert(TransactionId::new("20260807_101501_0_demo"), 42);
        let json = serde_json::to_string(&staged).unwrap();
        assert_eq!(json, r#"{"20260807_101501_0_demo":42}"#);
    }
}

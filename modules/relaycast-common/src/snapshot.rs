use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DomainRecord;

/// Cache/schema version stamped into every snapshot envelope. Bump when the
/// item shape changes so readers can discard artifacts they don't understand.
pub const SCHEMA_VERSION: &str = "relaycast.snapshot.v1";

/// A ranked item with the numbers that produced its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingEntry {
    pub record: DomainRecord,
    pub engagement_count: u64,
    pub engagement_amount: u64,
    pub recency_score: f64,
    pub composite_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotProvenance {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub generated_at: DateTime<Utc>,
    pub total_count: usize,
    pub sources_used: Vec<String>,
    pub provenance: SnapshotProvenance,
    pub schema_version: String,
}

/// A persisted pipeline artifact: an ordered, capped list of items plus the
/// envelope describing where they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub items: Vec<T>,
    pub metadata: SnapshotMetadata,
}

impl<T> Snapshot<T> {
    /// Build a primary snapshot, truncating `items` to `cap`.
    /// `generated_at` is taken now, at assembly time, not at query time.
    pub fn primary(mut items: Vec<T>, cap: usize, sources_used: Vec<String>) -> Self {
        items.truncate(cap);
        Self {
            metadata: SnapshotMetadata {
                generated_at: Utc::now(),
                total_count: items.len(),
                sources_used,
                provenance: SnapshotProvenance::Primary,
                schema_version: SCHEMA_VERSION.to_string(),
            },
            items,
        }
    }

    /// Minimal schema-valid artifact written in place of one that failed.
    pub fn fallback(sources_used: Vec<String>) -> Self {
        Self {
            items: Vec::new(),
            metadata: SnapshotMetadata {
                generated_at: Utc::now(),
                total_count: 0,
                sources_used,
                provenance: SnapshotProvenance::Fallback,
                schema_version: SCHEMA_VERSION.to_string(),
            },
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.metadata.provenance == SnapshotProvenance::Fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_snapshot_respects_cap() {
        let snap = Snapshot::primary(vec![1, 2, 3, 4, 5], 3, vec!["a".into()]);
        assert_eq!(snap.items, vec![1, 2, 3]);
        assert_eq!(snap.metadata.total_count, 3);
        assert_eq!(snap.metadata.provenance, SnapshotProvenance::Primary);
    }

    #[test]
    fn fallback_snapshot_is_empty_and_tagged() {
        let snap: Snapshot<u32> = Snapshot::fallback(vec![]);
        assert!(snap.items.is_empty());
        assert!(snap.is_fallback());
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["metadata"]["provenance"], "fallback");
        assert_eq!(json["metadata"]["schema_version"], SCHEMA_VERSION);
    }
}

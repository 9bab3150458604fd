//! Addressable record deduplication.
//!
//! Sources overlap and lag, so the same logical record arrives in several
//! versions. `latest_by_key` keeps one entry per dedup key: the one with the
//! greatest logical timestamp.

use std::collections::HashMap;

use relaycast_common::{Coordinate, DomainRecord, RawRecord};

/// Identity used to collapse versions. Coordinates already include the kind,
/// so keys from different kinds never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Coordinate(Coordinate),
    Id(String),
}

pub trait Versioned {
    fn dedup_key(&self) -> DedupKey;
    fn logical_timestamp(&self) -> i64;
    fn record_id(&self) -> &str;
}

impl Versioned for DomainRecord {
    fn dedup_key(&self) -> DedupKey {
        match self.coordinate() {
            Some(c) => DedupKey::Coordinate(c.clone()),
            None => DedupKey::Id(self.id().to_string()),
        }
    }

    fn logical_timestamp(&self) -> i64 {
        self.created_at()
    }

    fn record_id(&self) -> &str {
        self.id()
    }
}

impl Versioned for RawRecord {
    fn dedup_key(&self) -> DedupKey {
        match self.coordinate() {
            Some(c) => DedupKey::Coordinate(c),
            None => DedupKey::Id(self.id.clone()),
        }
    }

    fn logical_timestamp(&self) -> i64 {
        self.created_at
    }

    fn record_id(&self) -> &str {
        &self.id
    }
}

/// How to resolve two versions with the same logical timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// The version encountered last in input order wins. Depends on source
    /// response order, so it can differ between runs.
    #[default]
    LastSeen,
    /// The version with the lexicographically greatest global id wins.
    /// Stable regardless of input order.
    HighestId,
}

/// Keep one entry per key: the greatest logical timestamp, ties resolved by
/// `tie_break`. Output keeps the order in which each key first appeared.
pub fn latest_by_key<T: Versioned>(items: impl IntoIterator<Item = T>, tie_break: TieBreak) -> Vec<T> {
    let mut slots: Vec<T> = Vec::new();
    let mut index: HashMap<DedupKey, usize> = HashMap::new();

    for item in items {
        let key = item.dedup_key();
        match index.get(&key).copied() {
            None => {
                index.insert(key, slots.len());
                slots.push(item);
            }
            Some(i) => {
                let current = &slots[i];
                let replace = match item.logical_timestamp().cmp(&current.logical_timestamp()) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => match tie_break {
                        TieBreak::LastSeen => true,
                        TieBreak::HighestId => item.record_id() > current.record_id(),
                    },
                };
                if replace {
                    slots[i] = item;
                }
            }
        }
    }
    slots
}

#[cfg(test)]
mod tests {
    use relaycast_common::{Provenance, RecordKind, Track};

    use super::*;

    fn track(identifier: &str, id: char, created_at: i64) -> DomainRecord {
        let author = "a".repeat(64);
        DomainRecord::Track(Track {
            provenance: Provenance {
                id: id.to_string().repeat(64),
                author: author.clone(),
                created_at,
                coordinate: Some(Coordinate::new(RecordKind::Track, author, identifier)),
            },
            title: format!("{identifier}@{created_at}"),
            media_url: "u".into(),
            artist: None,
            image_url: None,
            duration_secs: None,
            genres: vec![],
        })
    }

    #[test]
    fn newest_version_wins() {
        let out = latest_by_key(
            vec![track("x", '1', 100), track("x", '2', 200), track("x", '3', 150)],
            TieBreak::LastSeen,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].created_at(), 200);
    }

    #[test]
    fn distinct_coordinates_kept_in_first_seen_order() {
        let out = latest_by_key(
            vec![track("b", '1', 1), track("a", '2', 1), track("b", '3', 5)],
            TieBreak::LastSeen,
        );
        let ids: Vec<_> = out
            .iter()
            .map(|r| r.coordinate().unwrap().identifier.clone())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(out[0].created_at(), 5);
    }

    #[test]
    fn last_seen_tie_break_takes_later_input() {
        let out = latest_by_key(vec![track("x", '9', 100), track("x", '1', 100)], TieBreak::LastSeen);
        assert_eq!(out[0].id(), "1".repeat(64));
    }

    #[test]
    fn highest_id_tie_break_is_order_independent() {
        let forward = latest_by_key(vec![track("x", '9', 100), track("x", '1', 100)], TieBreak::HighestId);
        let backward = latest_by_key(vec![track("x", '1', 100), track("x", '9', 100)], TieBreak::HighestId);
        assert_eq!(forward[0].id(), "9".repeat(64));
        assert_eq!(backward[0].id(), "9".repeat(64));
    }

    #[test]
    fn same_identifier_different_kind_not_merged() {
        let author = "a".repeat(64);
        let release = DomainRecord::Release(relaycast_common::Release {
            provenance: Provenance {
                id: "5".repeat(64),
                author: author.clone(),
                created_at: 1,
                coordinate: Some(Coordinate::new(RecordKind::Release, author, "x")),
            },
            title: "r".into(),
            description: None,
            image_url: None,
            tracks: vec![],
            is_playlist: false,
        });
        let out = latest_by_key(vec![track("x", '1', 1), release], TieBreak::LastSeen);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn raw_records_without_coordinate_dedup_by_id() {
        let raw = RawRecord {
            id: "4".repeat(64),
            author: "a".repeat(64),
            kind: 7,
            created_at: 3,
            tags: vec![],
            content: "+".into(),
            sig: String::new(),
        };
        let out = latest_by_key(vec![raw.clone(), raw.clone()], TieBreak::LastSeen);
        assert_eq!(out.len(), 1);
    }
}

//! Engagement tallies per target.
//!
//! Receipts arrive from several overlapping sources, so they are collapsed by
//! global id before counting. A receipt may name a record by id, by
//! coordinate, or both; it still counts once towards that record.

use std::collections::{BTreeSet, HashMap};

use relaycast_common::{DomainRecord, EngagementReceipt, Target};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub count: u64,
    pub amount: u64,
}

impl Tally {
    pub fn is_zero(&self) -> bool {
        self.count == 0 && self.amount == 0
    }
}

#[derive(Debug, Default)]
pub struct EngagementIndex {
    amounts: HashMap<String, u64>,
    by_target: HashMap<Target, BTreeSet<String>>,
}

impl EngagementIndex {
    pub fn build<'a>(receipts: impl IntoIterator<Item = &'a EngagementReceipt>) -> Self {
        let mut index = Self::default();
        for receipt in receipts {
            let id = &receipt.provenance.id;
            if index.amounts.contains_key(id) {
                continue;
            }
            index.amounts.insert(id.clone(), receipt.amount());
            for target in &receipt.targets {
                index
                    .by_target
                    .entry(target.clone())
                    .or_default()
                    .insert(id.clone());
            }
        }
        index
    }

    /// Number of distinct receipts indexed.
    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    /// Engagement for a record, counting receipts addressed to its id or its
    /// coordinate.
    pub fn for_record(&self, record: &DomainRecord) -> Tally {
        let mut ids: BTreeSet<&String> = BTreeSet::new();
        if let Some(set) = self.by_target.get(&Target::Record(record.id().to_string())) {
            ids.extend(set);
        }
        if let Some(coord) = record.coordinate() {
            if let Some(set) = self.by_target.get(&Target::Address(coord.clone())) {
                ids.extend(set);
            }
        }
        ids.into_iter().fold(Tally::default(), |mut tally, id| {
            tally.count += 1;
            tally.amount = tally
                .amount
                .saturating_add(self.amounts.get(id).copied().unwrap_or(0));
            tally
        })
    }
}

/// Collect engagement receipts out of a mixed batch of domain records.
pub fn receipts(records: &[DomainRecord]) -> Vec<&EngagementReceipt> {
    records
        .iter()
        .filter_map(|r| match r {
            DomainRecord::Engagement(e) => Some(e),
            _ => None,
        })
        .collect()
}

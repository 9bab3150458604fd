//! Trending ranking.
//!
//! score = w_amount·ln(amount+1) + w_count·ln(count+1) + w_recency·recency
//!
//! where recency falls linearly from 1.0 (now) to 0.0 at `window_days`.
//! After scoring, a per-author cap keeps any single author from filling the
//! list, and the result is cut to `limit`.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use relaycast_common::{Coordinate, DomainRecord, TrendingEntry};
use typed_builder::TypedBuilder;

use crate::engagement::{EngagementIndex, Tally};

const SECS_PER_DAY: f64 = 86_400.0;

/// Ranking knobs. Weights are intentionally not normalised: they may also
/// encode overall scale.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct TrendingParams {
    #[builder(default = 0.6)]
    pub w_amount: f64,
    #[builder(default = 0.25)]
    pub w_count: f64,
    #[builder(default = 0.15)]
    pub w_recency: f64,
    #[builder(default = 7.0)]
    pub window_days: f64,
    /// Max entries admitted per author.
    #[builder(default = 2)]
    pub per_author_cap: usize,
    #[builder(default = 12)]
    pub limit: usize,
}

impl Default for TrendingParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TrendingParams {
    pub fn from_config(config: &relaycast_common::Config) -> Self {
        Self {
            w_amount: config.weight_amount,
            w_count: config.weight_count,
            w_recency: config.weight_recency,
            window_days: config.window_days,
            per_author_cap: config.per_author_cap,
            limit: config.trending_limit,
        }
    }
}

/// Items that must not be surfaced, typically because they are already
/// featured elsewhere on the page.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    pub coordinates: HashSet<Coordinate>,
    pub ids: HashSet<String>,
}

impl Exclusions {
    /// Each entry is read as a coordinate if it parses as one, otherwise as a
    /// global record id.
    pub fn parse<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Self::default();
        for entry in entries {
            let entry = entry.as_ref().trim();
            match entry.parse::<Coordinate>() {
                Ok(c) => {
                    out.coordinates.insert(c);
                }
                Err(_) => {
                    out.ids.insert(entry.to_string());
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty() && self.ids.is_empty()
    }

    pub fn excludes(&self, record: &DomainRecord) -> bool {
        self.ids.contains(record.id())
            || record
                .coordinate()
                .is_some_and(|c| self.coordinates.contains(c))
    }
}

/// Linear decay: 1.0 at `now`, 0.0 at or beyond `window_days` old.
/// Negative timestamps mean "unknown" and are treated as maximally stale.
/// Timestamps ahead of `now` count as `now`.
pub fn recency(created_at: i64, now: DateTime<Utc>, window_days: f64) -> f64 {
    if created_at < 0 || window_days <= 0.0 {
        return 0.0;
    }
    let age = now.timestamp().saturating_sub(created_at).max(0);
    let days = age as f64 / SECS_PER_DAY;
    ((window_days - days) / window_days).clamp(0.0, 1.0)
}

pub fn score(tally: Tally, recency: f64, params: &TrendingParams) -> f64 {
    let raw = params.w_amount * (tally.amount as f64 + 1.0).ln()
        + params.w_count * (tally.count as f64 + 1.0).ln()
        + params.w_recency * recency;
    if raw.is_nan() {
        0.0
    } else {
        raw.max(0.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ranking {
    pub entries: Vec<TrendingEntry>,
    pub excluded: usize,
    /// Entries dropped by the per-author cap.
    pub capped: usize,
}

fn is_zero_engagement(entry: &TrendingEntry) -> bool {
    entry.engagement_amount == 0 && entry.engagement_count == 0
}

/// Score order, newest first on ties, then id for a fully deterministic
/// order. Two zero-engagement entries compare by timestamp alone.
fn compare(a: &TrendingEntry, b: &TrendingEntry) -> Ordering {
    let by_time = b.record.created_at().cmp(&a.record.created_at());
    let by_id = a.record.id().cmp(b.record.id());
    if is_zero_engagement(a) && is_zero_engagement(b) {
        return by_time.then(by_id);
    }
    b.composite_score
        .total_cmp(&a.composite_score)
        .then(by_time)
        .then(by_id)
}

/// Rank candidates. Candidates are expected to be deduplicated already.
pub fn rank(
    candidates: Vec<DomainRecord>,
    engagement: &EngagementIndex,
    exclusions: &Exclusions,
    now: DateTime<Utc>,
    params: &TrendingParams,
) -> Ranking {
    let total = candidates.len();

    // 1. exclusions
    let kept: Vec<DomainRecord> = candidates
        .into_iter()
        .filter(|r| !exclusions.excludes(r))
        .collect();
    let excluded = total - kept.len();

    // 2. score
    let mut scored: Vec<TrendingEntry> = kept
        .into_iter()
        .map(|record| {
            let tally = engagement.for_record(&record);
            let recency_score = recency(record.created_at(), now, params.window_days);
            TrendingEntry {
                composite_score: score(tally, recency_score, params),
                engagement_count: tally.count,
                engagement_amount: tally.amount,
                recency_score,
                record,
            }
        })
        .collect();

    // 3. order
    scored.sort_by(compare);

    // 4. author cap, 5. limit
    let mut per_author: HashMap<String, usize> = HashMap::new();
    let mut capped = 0;
    let mut entries = Vec::with_capacity(params.limit.min(scored.len()));
    for entry in scored {
        if entries.len() == params.limit {
            break;
        }
        let admitted = per_author
            .entry(entry.record.author().to_string())
            .or_insert(0);
        if *admitted >= params.per_author_cap {
            capped += 1;
            continue;
        }
        *admitted += 1;
        entries.push(entry);
    }

    Ranking {
        entries,
        excluded,
        capped,
    }
}

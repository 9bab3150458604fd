//! Pipeline orchestration.
//!
//! fan-out → validate/convert → dedup per kind → (rank) → (snapshot)
//!
//! Every entry point returns a best-effort result with a `degraded` flag.
//! Source and record problems are counted and reported as events, never
//! returned as errors.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use relaycast_common::{DomainRecord, Filter, PipelineEvent, ProfileInfo, RecordKind, Target};

use crate::convert::{convert_batch, AmountExtractor, AmountTagExtractor};
use crate::dedup::{latest_by_key, TieBreak};
use crate::engagement::{receipts, EngagementIndex};
use crate::events::{EventSink, TracingSink};
use crate::fanout::SourcePool;
use crate::profiles::ProfileCache;
use crate::snapshot::{SnapshotInput, SnapshotWriter, WriteReport};
use crate::stats::RunStats;
use crate::trending::{rank, Exclusions, TrendingParams};

/// Targets per engagement query.
pub const ENGAGEMENT_TARGETS_PER_QUERY: usize = 50;

/// Deduplicated domain records for one filter.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub records: Vec<DomainRecord>,
    pub sources_used: Vec<String>,
    /// Some source failed or timed out.
    pub degraded: bool,
    /// Every source failed; `records` is empty for lack of data, not because
    /// nothing matched.
    pub unavailable: bool,
    /// Some source hit the query limit; `records` may be incomplete.
    pub saturated: bool,
    pub stats: RunStats,
}

impl Collected {
    /// Fold another partial result for the same request into this one.
    fn absorb(&mut self, other: Collected) {
        self.records.extend(other.records);
        for source in other.sources_used {
            if !self.sources_used.contains(&source) {
                self.sources_used.push(source);
            }
        }
        self.degraded |= other.degraded;
        self.unavailable |= other.unavailable;
        self.saturated |= other.saturated;
        self.stats.merge(&other.stats);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ranked {
    pub entries: Vec<relaycast_common::TrendingEntry>,
    pub sources_used: Vec<String>,
    pub degraded: bool,
    pub unavailable: bool,
    pub stats: RunStats,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotRun {
    pub report: WriteReport,
    pub degraded: bool,
    pub stats: RunStats,
}

pub struct Aggregator {
    pool: SourcePool,
    amounts: Arc<dyn AmountExtractor>,
    tie_break: TieBreak,
    events: Arc<dyn EventSink>,
}

impl Aggregator {
    pub fn new(pool: SourcePool) -> Self {
        Self {
            pool,
            amounts: Arc::new(AmountTagExtractor),
            tie_break: TieBreak::default(),
            events: Arc::new(TracingSink),
        }
    }

    pub fn with_amount_extractor(mut self, amounts: Arc<dyn AmountExtractor>) -> Self {
        self.amounts = amounts;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Route pipeline events (including the pool's) to `events`.
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.pool = self.pool.with_events(events.clone());
        self.events = events;
        self
    }

    /// Fetch, validate, and deduplicate everything matching `filter`.
    pub async fn collect(&self, filter: &Filter) -> Collected {
        let fanout = self.pool.fetch(filter).await;

        let mut stats = RunStats {
            sources_ok: fanout.sources_used().len() as u32,
            sources_failed: fanout.failed() as u32,
            sources_timed_out: fanout.timed_out() as u32,
            raw_records: fanout.records.len() as u32,
            ..Default::default()
        };

        let converted = convert_batch(&fanout.records, self.amounts.as_ref());
        stats.rejected = converted.rejected.len() as u32;
        for rejection in &converted.rejected {
            self.events.emit(PipelineEvent::RecordRejected {
                id: rejection.id.clone(),
                kind: rejection.kind,
                reason: rejection.reason.clone(),
            });
        }

        // Coordinates are only unique within a kind, so dedup each kind on its own.
        // Sources that ignore the kind constraint get their extras dropped here.
        let wanted = filter.kinds();
        let mut by_kind: BTreeMap<RecordKind, Vec<DomainRecord>> = BTreeMap::new();
        for record in converted.records {
            if !wanted.contains(&record.kind()) {
                stats.rejected += 1;
                self.events.emit(PipelineEvent::RecordRejected {
                    id: record.id().to_string(),
                    kind: record.kind().number(),
                    reason: "unrequested_kind".to_string(),
                });
                continue;
            }
            by_kind.entry(record.kind()).or_default().push(record);
        }

        let mut records = Vec::new();
        for (kind, batch) in by_kind {
            let input = batch.len();
            let latest = latest_by_key(batch, self.tie_break);
            stats.deduplicated += (input - latest.len()) as u32;
            self.events.emit(PipelineEvent::Deduplicated {
                kind,
                input,
                output: latest.len(),
            });
            records.extend(latest);
        }

        Collected {
            records,
            sources_used: fanout.sources_used(),
            degraded: fanout.degraded,
            unavailable: fanout.all_failed(),
            saturated: fanout.saturated,
            stats,
        }
    }

    /// Collect `filter` and rank the results by engagement and recency.
    pub async fn trending(
        &self,
        filter: &Filter,
        exclusions: &Exclusions,
        params: &TrendingParams,
        now: DateTime<Utc>,
    ) -> Ranked {
        let candidates = self.collect(filter).await;
        self.rank_collected(candidates, exclusions, params, now).await
    }

    async fn rank_collected(
        &self,
        candidates: Collected,
        exclusions: &Exclusions,
        params: &TrendingParams,
        now: DateTime<Utc>,
    ) -> Ranked {
        let mut stats = candidates.stats.clone();
        let mut degraded = candidates.degraded || candidates.saturated;

        let index = if candidates.records.is_empty() {
            EngagementIndex::default()
        } else {
            // Tag constraints are conjunctive on the wire, so receipts that
            // point by coordinate and receipts that point by id need separate
            // queries.
            let (addresses, ids) = engagement_targets(&candidates.records);
            let (by_address, by_id) = tokio::join!(
                self.collect_engagement(addresses),
                self.collect_engagement(ids)
            );

            let mut index_input = Vec::new();
            for engagement in [&by_address, &by_id] {
                // A truncated receipt set undercounts engagement.
                degraded |= engagement.degraded || engagement.saturated;
                stats.merge(&engagement.stats);
                index_input.extend(receipts(&engagement.records));
            }
            EngagementIndex::build(index_input)
        };

        let total = candidates.records.len();
        let ranking = rank(candidates.records, &index, exclusions, now, params);
        stats.excluded = ranking.excluded as u32;
        stats.author_capped = ranking.capped as u32;
        stats.ranked = ranking.entries.len() as u32;

        self.events.emit(PipelineEvent::Ranked {
            candidates: total,
            excluded: ranking.excluded,
            capped: ranking.capped,
            output: ranking.entries.len(),
        });

        Ranked {
            entries: ranking.entries,
            sources_used: candidates.sources_used,
            degraded,
            unavailable: candidates.unavailable,
            stats,
        }
    }

    async fn collect_engagement(&self, targets: Vec<Target>) -> Collected {
        // An engagement query without targets would match every receipt.
        if targets.is_empty() {
            return Collected::default();
        }
        let batches = targets
            .chunks(ENGAGEMENT_TARGETS_PER_QUERY)
            .map(|chunk| async move {
                let filter = Filter::Engagement {
                    targets: chunk.to_vec(),
                    limit: None,
                };
                self.collect(&filter).await
            });

        let mut merged = Collected::default();
        for batch in futures::future::join_all(batches).await {
            merged.absorb(batch);
        }
        merged
    }

    /// Profiles for `authors`, served from `cache` where possible. Only
    /// authors missing from the cache are fetched.
    pub async fn resolve_profiles(
        &self,
        authors: &[String],
        cache: &ProfileCache,
    ) -> (HashMap<String, ProfileInfo>, bool) {
        let missing = cache.missing(authors).await;
        let mut degraded = false;

        if !missing.is_empty() {
            let fetched = self
                .collect(&Filter::Profiles { authors: missing })
                .await;
            degraded = fetched.degraded;
            for record in fetched.records {
                if let DomainRecord::Profile(profile) = record {
                    cache.insert(profile).await;
                }
            }
        }

        let mut out = HashMap::new();
        for author in authors {
            if let Some(profile) = cache.get(author).await {
                out.insert(author.clone(), profile);
            }
        }
        (out, degraded)
    }

    /// Batch path: gather tracks and releases, rank tracks, write artifacts.
    pub async fn build_snapshot(
        &self,
        writer: &SnapshotWriter,
        exclusions: &Exclusions,
        params: &TrendingParams,
        now: DateTime<Utc>,
    ) -> SnapshotRun {
        let track_filter = Filter::tracks();
        let release_filter = Filter::releases();
        let (tracks, releases) =
            tokio::join!(self.collect(&track_filter), self.collect(&release_filter));

        let mut stats = RunStats::default();
        stats.merge(&releases.stats);

        let mut sources_used = tracks.sources_used.clone();
        for s in &releases.sources_used {
            if !sources_used.contains(s) {
                sources_used.push(s.clone());
            }
        }

        let tracks_available = !tracks.unavailable;
        let track_records = tracks.records.clone();
        let ranked = self.rank_collected(tracks, exclusions, params, now).await;
        stats.merge(&ranked.stats);

        let input = SnapshotInput {
            tracks: tracks_available.then_some(track_records),
            releases: (!releases.unavailable).then_some(releases.records),
            trending: tracks_available.then_some(ranked.entries),
            sources_used,
        };

        let report = writer.write(&input).await;
        stats.artifacts_written = report.written() as u32;
        stats.artifacts_fallback = report.fallbacks() as u32;
        stats.artifacts_lost = report.lost() as u32;

        SnapshotRun {
            degraded: ranked.degraded
                || releases.degraded
                || releases.saturated
                || report.degraded(),
            report,
            stats,
        }
    }
}

/// Every way a receipt might point at one of `records`: (coordinates, ids).
fn engagement_targets(records: &[DomainRecord]) -> (Vec<Target>, Vec<Target>) {
    let mut addresses = Vec::new();
    let mut ids = Vec::with_capacity(records.len());
    for record in records {
        ids.push(Target::Record(record.id().to_string()));
        if let Some(c) = record.coordinate() {
            addresses.push(Target::Address(c.clone()));
        }
    }
    (addresses, ids)
}

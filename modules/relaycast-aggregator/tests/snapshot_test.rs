//! Snapshot writer tests: artifact isolation, fallbacks, caps, and the
//! filesystem sink.

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use relaycast_aggregator::convert::{convert, AmountTagExtractor};
use relaycast_aggregator::events::MemorySink;
use relaycast_aggregator::snapshot::{
    ArtifactStatus, LATEST_ARTIFACT, RELEASES_ARTIFACT, TRACKS_ARTIFACT, TRENDING_ARTIFACT,
};
use relaycast_aggregator::testing::{FailingSource, MemoryArtifactSink, RawBuilder, StaticSource};
use relaycast_aggregator::{
    Aggregator, Exclusions, FsSink, RecordSource, SnapshotInput, SnapshotWriter, SourcePool,
    TrendingParams,
};
use relaycast_common::{DomainRecord, PipelineEvent, RawRecord, Snapshot, TrendingEntry};

fn domain(raw: RawRecord) -> DomainRecord {
    convert(&raw, &AmountTagExtractor).unwrap()
}

fn releases(n: u64) -> Vec<DomainRecord> {
    (0..n)
        .map(|i| domain(RawBuilder::release('a', &format!("r{i}"), 100 + i as i64).id(i + 1).build()))
        .collect()
}

fn tracks(n: u64) -> Vec<DomainRecord> {
    (0..n)
        .map(|i| domain(RawBuilder::track('b', &format!("t{i}"), 100 + i as i64).id(100 + i).build()))
        .collect()
}

fn full_input() -> SnapshotInput {
    SnapshotInput {
        tracks: Some(tracks(3)),
        releases: Some(releases(3)),
        trending: Some(Vec::new()),
        sources_used: vec!["relay".to_string()],
    }
}

#[tokio::test]
async fn per_item_failures_leave_collection_and_latest_intact() {
    let sink = Arc::new(MemoryArtifactSink::new().failing_on("items/"));
    let writer = SnapshotWriter::new(sink.clone(), 200, 50);

    let report = writer.write(&full_input()).await;

    assert_eq!(
        report.status(RELEASES_ARTIFACT),
        Some(&ArtifactStatus::Written { items: 3 })
    );
    assert_eq!(
        report.status(LATEST_ARTIFACT),
        Some(&ArtifactStatus::Written { items: 1 })
    );
    assert_eq!(report.lost(), 3, "all three per-item artifacts lost");

    let collection: Snapshot<DomainRecord> = sink.snapshot(RELEASES_ARTIFACT).unwrap();
    assert!(!collection.is_fallback());
    assert_eq!(collection.items.len(), 3);

    let latest: Snapshot<DomainRecord> = sink.snapshot(LATEST_ARTIFACT).unwrap();
    assert_eq!(latest.items[0].created_at(), 102);
    assert!(sink.names().iter().all(|n| !n.starts_with("items/")));
}

#[tokio::test]
async fn collections_are_newest_first_and_capped() {
    let sink = Arc::new(MemoryArtifactSink::new());
    let writer = SnapshotWriter::new(sink.clone(), 2, 1);
    let input = SnapshotInput {
        tracks: Some(tracks(5)),
        releases: Some(releases(5)),
        trending: Some(Vec::new()),
        sources_used: vec!["relay".to_string()],
    };

    let report = writer.write(&input).await;

    let tracks: Snapshot<DomainRecord> = sink.snapshot(TRACKS_ARTIFACT).unwrap();
    let stamps: Vec<i64> = tracks.items.iter().map(|r| r.created_at()).collect();
    assert_eq!(stamps, vec![104, 103]);
    assert_eq!(tracks.metadata.total_count, 2);
    assert_eq!(tracks.metadata.sources_used, vec!["relay"]);

    let items: Vec<String> = sink
        .names()
        .into_iter()
        .filter(|n| n.starts_with("items/"))
        .collect();
    assert_eq!(items.len(), 1, "per-item cap applies");
    assert_eq!(report.lost(), 0);
    assert!(!report.degraded());
}

#[tokio::test]
async fn unavailable_collection_is_written_as_fallback() {
    let sink = Arc::new(MemoryArtifactSink::new());
    let events = Arc::new(MemorySink::new());
    let writer = SnapshotWriter::new(sink.clone(), 200, 50).with_events(events.clone());
    let input = SnapshotInput {
        tracks: Some(tracks(2)),
        releases: None,
        trending: Some(Vec::new()),
        sources_used: Vec::new(),
    };

    let report = writer.write(&input).await;

    assert!(matches!(
        report.status(RELEASES_ARTIFACT),
        Some(ArtifactStatus::Fallback { .. })
    ));
    assert!(matches!(
        report.status(LATEST_ARTIFACT),
        Some(ArtifactStatus::Fallback { .. })
    ));
    assert_eq!(
        report.status(TRACKS_ARTIFACT),
        Some(&ArtifactStatus::Written { items: 2 })
    );

    let releases: Snapshot<DomainRecord> = sink.snapshot(RELEASES_ARTIFACT).unwrap();
    assert!(releases.is_fallback());
    assert!(releases.items.is_empty());
    assert!(events
        .events()
        .iter()
        .any(|e| matches!(e, PipelineEvent::ArtifactFallback { name, .. } if name == RELEASES_ARTIFACT)));
}

#[tokio::test]
async fn trending_artifact_keeps_ranked_order() {
    let sink = Arc::new(MemoryArtifactSink::new());
    let writer = SnapshotWriter::new(sink.clone(), 200, 0);
    let entries: Vec<TrendingEntry> = tracks(2)
        .into_iter()
        .zip([0.9, 0.1])
        .map(|(record, score)| TrendingEntry {
            record,
            engagement_count: 1,
            engagement_amount: 10,
            recency_score: score,
            composite_score: score,
        })
        .collect();
    let input = SnapshotInput {
        trending: Some(entries),
        ..full_input()
    };

    writer.write(&input).await;

    let trending: Snapshot<TrendingEntry> = sink.snapshot(TRENDING_ARTIFACT).unwrap();
    assert_eq!(trending.items.len(), 2);
    assert!(trending.items[0].composite_score > trending.items[1].composite_score);
}

#[tokio::test]
async fn fs_sink_writes_parseable_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let writer = SnapshotWriter::new(Arc::new(FsSink::new(dir.path())), 200, 50);

    let report = writer.write(&full_input()).await;
    assert_eq!(report.lost(), 0);
    assert_eq!(report.fallbacks(), 0);

    let bytes = std::fs::read(dir.path().join(RELEASES_ARTIFACT)).unwrap();
    let releases: Snapshot<DomainRecord> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(releases.items.len(), 3);

    let items = std::fs::read_dir(dir.path().join("items")).unwrap().count();
    assert_eq!(items, 3);

    let leftovers = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0, "temp files are renamed into place");
}

#[tokio::test]
async fn build_snapshot_end_to_end() {
    let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let records = vec![
        RawBuilder::track('a', "song", 1_699_990_000).id(1).build(),
        RawBuilder::release('a', "album", 1_699_990_000).id(2).build(),
    ];
    let sources: Vec<Arc<dyn RecordSource>> = vec![
        Arc::new(StaticSource::new("up", records)),
        Arc::new(FailingSource::new("down")),
    ];
    let aggregator = Aggregator::new(SourcePool::new(sources, Duration::from_secs(2)).unwrap());
    let sink = Arc::new(MemoryArtifactSink::new());
    let writer = SnapshotWriter::new(sink.clone(), 200, 50);

    let run = aggregator
        .build_snapshot(&writer, &Exclusions::default(), &TrendingParams::default(), now)
        .await;

    assert!(run.degraded, "one source was down");
    assert_eq!(run.report.lost(), 0);
    assert_eq!(run.report.fallbacks(), 0);
    assert_eq!(run.stats.artifacts_written, 5);

    let trending: Snapshot<TrendingEntry> = sink.snapshot(TRENDING_ARTIFACT).unwrap();
    assert_eq!(trending.items.len(), 1);
    assert_eq!(trending.metadata.sources_used, vec!["up"]);
}

#[tokio::test]
async fn build_snapshot_with_no_sources_writes_fallbacks() {
    let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let sources: Vec<Arc<dyn RecordSource>> = vec![Arc::new(FailingSource::new("down"))];
    let aggregator = Aggregator::new(SourcePool::new(sources, Duration::from_secs(2)).unwrap());
    let sink = Arc::new(MemoryArtifactSink::new());
    let writer = SnapshotWriter::new(sink.clone(), 200, 50);

    let run = aggregator
        .build_snapshot(&writer, &Exclusions::default(), &TrendingParams::default(), now)
        .await;

    assert!(run.degraded);
    assert_eq!(run.report.fallbacks(), 4);
    let tracks: Snapshot<DomainRecord> = sink.snapshot(TRACKS_ARTIFACT).unwrap();
    assert!(tracks.is_fallback());
}

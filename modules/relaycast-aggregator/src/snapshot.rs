//! Snapshot writer.
//!
//! Turns one pipeline run into a set of independent JSON artifacts:
//!
//! - `tracks.json` / `releases.json`: full collections, newest first, capped
//! - `latest.json`: the single most recent release
//! - `trending.json`: the ranked list
//! - `items/<id>.json`: one artifact per release, up to the per-item cap
//!
//! Artifacts are built and persisted concurrently. If one cannot be encoded
//! or stored, a schema-valid empty artifact tagged `fallback` is written under
//! the same name instead; the others are unaffected.

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use relaycast_common::{DomainRecord, PipelineEvent, RelaycastError, Snapshot, TrendingEntry};
use serde::Serialize;

use crate::events::{EventSink, TracingSink};

pub const TRACKS_ARTIFACT: &str = "tracks.json";
pub const RELEASES_ARTIFACT: &str = "releases.json";
pub const LATEST_ARTIFACT: &str = "latest.json";
pub const TRENDING_ARTIFACT: &str = "trending.json";
pub const ITEMS_DIR: &str = "items";

// ---------------------------------------------------------------------------
// ArtifactSink
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Store `bytes` under `name`, replacing any previous artifact. Readers
    /// must never observe a partially written artifact.
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<()>;
}

/// Writes artifacts under a root directory: temp file, then rename.
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let rel = Path::new(name);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("artifact name must be a relative path without '..': {name}");
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ArtifactSink for FsSink {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&temp_path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;

        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e).with_context(|| format!("Failed to finalize {}", path.display()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactStatus {
    Written { items: usize },
    /// The primary artifact failed; an empty fallback was stored instead.
    Fallback { error: String },
    /// Neither the artifact nor its fallback could be stored.
    Lost { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReport {
    pub name: String,
    pub status: ArtifactStatus,
}

#[derive(Debug, Clone, Default)]
pub struct WriteReport {
    pub artifacts: Vec<ArtifactReport>,
}

impl WriteReport {
    pub fn status(&self, name: &str) -> Option<&ArtifactStatus> {
        self.artifacts
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.status)
    }

    pub fn written(&self) -> usize {
        self.count(|s| matches!(s, ArtifactStatus::Written { .. }))
    }

    pub fn fallbacks(&self) -> usize {
        self.count(|s| matches!(s, ArtifactStatus::Fallback { .. }))
    }

    pub fn lost(&self) -> usize {
        self.count(|s| matches!(s, ArtifactStatus::Lost { .. }))
    }

    pub fn degraded(&self) -> bool {
        self.written() < self.artifacts.len()
    }

    /// Fallbacks are acceptable output; a lost artifact is not.
    pub fn ensure_persisted(&self) -> Result<(), RelaycastError> {
        let lost: Vec<&str> = self
            .artifacts
            .iter()
            .filter(|a| matches!(a.status, ArtifactStatus::Lost { .. }))
            .map(|a| a.name.as_str())
            .collect();
        if lost.is_empty() {
            return Ok(());
        }
        Err(RelaycastError::Persistence(format!(
            "{} artifact(s) could not be written: {}",
            lost.len(),
            lost.join(", ")
        )))
    }

    fn count(&self, pred: impl Fn(&ArtifactStatus) -> bool) -> usize {
        self.artifacts.iter().filter(|a| pred(&a.status)).count()
    }
}

// ---------------------------------------------------------------------------
// SnapshotWriter
// ---------------------------------------------------------------------------

/// Everything one run contributes to its snapshot. `None` means the
/// collection could not be gathered at all this run; its artifacts are
/// written as fallbacks rather than as empty primaries.
#[derive(Debug, Clone, Default)]
pub struct SnapshotInput {
    pub tracks: Option<Vec<DomainRecord>>,
    pub releases: Option<Vec<DomainRecord>>,
    pub trending: Option<Vec<TrendingEntry>>,
    pub sources_used: Vec<String>,
}

pub struct SnapshotWriter {
    sink: Arc<dyn ArtifactSink>,
    collection_cap: usize,
    per_item_cap: usize,
    events: Arc<dyn EventSink>,
}

type ArtifactFuture<'a> = Pin<Box<dyn Future<Output = ArtifactReport> + Send + 'a>>;

fn newest_first(records: &[DomainRecord]) -> Vec<DomainRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| a.id().cmp(b.id()))
    });
    sorted
}

fn encode<T: Serialize>(snapshot: &Snapshot<T>) -> Result<(Vec<u8>, usize)> {
    let bytes = serde_json::to_vec_pretty(snapshot).context("Failed to encode snapshot")?;
    Ok((bytes, snapshot.items.len()))
}

fn available<T>(collection: Option<T>, what: &str) -> Result<T> {
    collection.with_context(|| format!("{what} unavailable: no source answered"))
}

impl SnapshotWriter {
    pub fn new(sink: Arc<dyn ArtifactSink>, collection_cap: usize, per_item_cap: usize) -> Self {
        Self {
            sink,
            collection_cap,
            per_item_cap,
            events: Arc::new(TracingSink),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Build and persist every artifact concurrently.
    pub async fn write(&self, input: &SnapshotInput) -> WriteReport {
        let tracks = input.tracks.as_deref().map(newest_first);
        let releases = input.releases.as_deref().map(newest_first);
        let sources = &input.sources_used;
        let cap = self.collection_cap;

        let mut jobs: Vec<ArtifactFuture<'_>> = Vec::new();

        jobs.push(self.job(TRACKS_ARTIFACT.to_string(), sources, move |sources| {
            Ok(Snapshot::primary(available(tracks, "tracks")?, cap, sources))
        }));

        jobs.push(self.job(RELEASES_ARTIFACT.to_string(), sources, {
            let releases = releases.clone();
            move |sources| Ok(Snapshot::primary(available(releases, "releases")?, cap, sources))
        }));

        jobs.push(self.job(LATEST_ARTIFACT.to_string(), sources, {
            let latest = releases
                .as_ref()
                .map(|r| r.first().cloned().into_iter().collect::<Vec<_>>());
            move |sources| Ok(Snapshot::primary(available(latest, "releases")?, 1, sources))
        }));

        jobs.push(self.job(TRENDING_ARTIFACT.to_string(), sources, {
            let trending = input.trending.clone();
            move |sources| {
                let trending = available(trending, "trending")?;
                let cap = trending.len();
                Ok(Snapshot::primary(trending, cap, sources))
            }
        }));

        for release in releases.unwrap_or_default().into_iter().take(self.per_item_cap) {
            let name = format!("{ITEMS_DIR}/{}.json", release.id());
            jobs.push(self.job(name, sources, move |sources| {
                Ok(Snapshot::primary(vec![release], 1, sources))
            }));
        }

        let artifacts = futures::future::join_all(jobs).await;
        WriteReport { artifacts }
    }

    fn job<'a, T, F>(&'a self, name: String, sources: &[String], build: F) -> ArtifactFuture<'a>
    where
        T: Serialize + Send + 'a,
        F: FnOnce(Vec<String>) -> Result<Snapshot<T>> + Send + 'a,
    {
        let sources = sources.to_vec();
        Box::pin(async move {
            // Built inside the task so generated_at reflects write time.
            let encoded = build(sources.clone()).and_then(|snapshot| encode(&snapshot));
            self.persist(name, encoded, sources).await
        })
    }

    async fn persist(
        &self,
        name: String,
        encoded: Result<(Vec<u8>, usize)>,
        sources: Vec<String>,
    ) -> ArtifactReport {
        let primary_error = match encoded {
            Ok((bytes, items)) => match self.sink.put(&name, bytes).await {
                Ok(()) => {
                    self.events.emit(PipelineEvent::ArtifactWritten {
                        name: name.clone(),
                        items,
                    });
                    return ArtifactReport {
                        name,
                        status: ArtifactStatus::Written { items },
                    };
                }
                Err(e) => format!("{e:#}"),
            },
            Err(e) => format!("{e:#}"),
        };

        let fallback: Snapshot<serde_json::Value> = Snapshot::fallback(sources);
        let stored = match encode(&fallback) {
            Ok((bytes, _)) => self.sink.put(&name, bytes).await,
            Err(e) => Err(e),
        };

        let status = match stored {
            Ok(()) => {
                self.events.emit(PipelineEvent::ArtifactFallback {
                    name: name.clone(),
                    error: primary_error.clone(),
                });
                ArtifactStatus::Fallback {
                    error: primary_error,
                }
            }
            Err(e) => {
                let error = format!("{primary_error}; fallback: {e:#}");
                self.events.emit(PipelineEvent::ArtifactLost {
                    name: name.clone(),
                    error: error.clone(),
                });
                ArtifactStatus::Lost { error }
            }
        };
        ArtifactReport { name, status }
    }
}

//! Test mocks for the aggregation pipeline.
//!
//! Mocks matching the two I/O trait boundaries:
//! - StaticSource / FailingSource / SlowSource (RecordSource)
//! - MemoryArtifactSink (ArtifactSink), optionally failing on name prefixes
//!
//! Plus RawBuilder for constructing well-formed raw records.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use relaycast_common::{RawRecord, RecordKind, Snapshot, SourceQuery};
use serde::de::DeserializeOwned;

use crate::snapshot::ArtifactSink;
use crate::source::RecordSource;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Does `raw` satisfy `query` the way a well-behaved source would evaluate it?
pub fn matches_query(query: &SourceQuery, raw: &RawRecord) -> bool {
    if !query.kinds.contains(&raw.kind) {
        return false;
    }
    if let Some(authors) = &query.authors {
        if !authors.contains(&raw.author) {
            return false;
        }
    }
    query
        .tags
        .iter()
        .all(|(name, values)| raw.tag_values(name).any(|v| values.iter().any(|w| w == v)))
}

/// Answers from a fixed record set, filtered by the query.
pub struct StaticSource {
    name: String,
    records: Vec<RawRecord>,
}

impl StaticSource {
    pub fn new(name: &str, records: Vec<RawRecord>) -> Self {
        Self {
            name: name.to_string(),
            records,
        }
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, query: &SourceQuery) -> Result<Vec<RawRecord>> {
        let mut out: Vec<RawRecord> = self
            .records
            .iter()
            .filter(|r| matches_query(query, r))
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }
}

/// Always errors.
pub struct FailingSource {
    name: String,
}

impl FailingSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl RecordSource for FailingSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, _query: &SourceQuery) -> Result<Vec<RawRecord>> {
        bail!("connection refused")
    }
}

/// Waits `delay` before answering like a StaticSource.
pub struct SlowSource {
    inner: StaticSource,
    delay: Duration,
}

impl SlowSource {
    pub fn new(name: &str, delay: Duration, records: Vec<RawRecord>) -> Self {
        Self {
            inner: StaticSource::new(name, records),
            delay,
        }
    }
}

#[async_trait]
impl RecordSource for SlowSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn query(&self, query: &SourceQuery) -> Result<Vec<RawRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.query(query).await
    }
}

// ---------------------------------------------------------------------------
// MemoryArtifactSink
// ---------------------------------------------------------------------------

/// In-memory artifact store. Writes to names starting with any registered
/// failing prefix return an error.
#[derive(Default)]
pub struct MemoryArtifactSink {
    artifacts: Mutex<BTreeMap<String, Vec<u8>>>,
    failing_prefixes: Vec<String>,
}

impl MemoryArtifactSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, prefix: &str) -> Self {
        self.failing_prefixes.push(prefix.to_string());
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.artifacts
            .lock()
            .map(|a| a.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn snapshot<T: DeserializeOwned>(&self, name: &str) -> Option<Snapshot<T>> {
        let artifacts = self.artifacts.lock().ok()?;
        serde_json::from_slice(artifacts.get(name)?).ok()
    }
}

#[async_trait]
impl ArtifactSink for MemoryArtifactSink {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        if self.failing_prefixes.iter().any(|p| name.starts_with(p)) {
            bail!("disk full writing {name}");
        }
        match self.artifacts.lock() {
            Ok(mut artifacts) => {
                artifacts.insert(name.to_string(), bytes);
                Ok(())
            }
            Err(_) => bail!("artifact store poisoned"),
        }
    }
}

// ---------------------------------------------------------------------------
// RawBuilder
// ---------------------------------------------------------------------------

/// Fluent constructor for structurally valid raw records.
///
/// ```ignore
/// let raw = RawBuilder::track('a', "song-1", 100).id(1).build();
/// ```
pub struct RawBuilder {
    raw: RawRecord,
}

pub fn author(c: char) -> String {
    c.to_string().repeat(64)
}

impl RawBuilder {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            raw: RawRecord {
                id: format!("{:064x}", 0),
                author: author('a'),
                kind: kind.number(),
                created_at: 0,
                tags: Vec::new(),
                content: String::new(),
                sig: "f".repeat(128),
            },
        }
    }

    pub fn track(author_char: char, d: &str, created_at: i64) -> Self {
        Self::new(RecordKind::Track)
            .author(author_char)
            .created_at(created_at)
            .tag(&["d", d])
            .tag(&["title", &format!("Track {d}")])
            .tag(&["url", &format!("https://cdn.example/{d}.mp3")])
    }

    pub fn release(author_char: char, d: &str, created_at: i64) -> Self {
        Self::new(RecordKind::Release)
            .author(author_char)
            .created_at(created_at)
            .tag(&["d", d])
            .tag(&["title", &format!("Release {d}")])
    }

    /// Paid engagement of `sats` aimed at `coordinate`.
    pub fn zap(coordinate: &str, sats: u64, created_at: i64) -> Self {
        Self::new(RecordKind::PaidEngagement)
            .author('e')
            .created_at(created_at)
            .tag(&["a", coordinate])
            .tag(&["amount", &(sats * 1000).to_string()])
    }

    pub fn reaction(coordinate: &str, created_at: i64) -> Self {
        Self::new(RecordKind::Reaction)
            .author('e')
            .created_at(created_at)
            .tag(&["a", coordinate])
            .content("+")
    }

    pub fn profile(author_char: char, name: &str, created_at: i64) -> Self {
        Self::new(RecordKind::Profile)
            .author(author_char)
            .created_at(created_at)
            .content(&format!(r#"{{"name":"{name}"}}"#))
    }

    pub fn id(mut self, seed: u64) -> Self {
        self.raw.id = format!("{seed:064x}");
        self
    }

    pub fn author(mut self, c: char) -> Self {
        self.raw.author = author(c);
        self
    }

    pub fn created_at(mut self, ts: i64) -> Self {
        self.raw.created_at = ts;
        self
    }

    pub fn tag(mut self, tag: &[&str]) -> Self {
        self.raw.tags.push(tag.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn content(mut self, content: &str) -> Self {
        self.raw.content = content.to_string();
        self
    }

    pub fn sig(mut self, sig: &str) -> Self {
        self.raw.sig = sig.to_string();
        self
    }

    pub fn build(self) -> RawRecord {
        self.raw
    }
}

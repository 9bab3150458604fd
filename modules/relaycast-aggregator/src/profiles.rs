//! Profile cache: author → latest ProfileInfo, with a TTL.
//!
//! Owned by whoever drives the pipeline and passed in explicitly; there is no
//! process-wide cache. Entries expire `ttl` after they were stored and can be
//! dropped early with `invalidate`.

use std::collections::HashMap;
use std::time::Duration;

use relaycast_common::ProfileInfo;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct CachedProfile {
    profile: ProfileInfo,
    stored_at: Instant,
}

pub struct ProfileCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedProfile>>,
}

impl ProfileCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn fresh(&self, entry: &CachedProfile, now: Instant) -> bool {
        now.duration_since(entry.stored_at) < self.ttl
    }

    pub async fn get(&self, author: &str) -> Option<ProfileInfo> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries
            .get(author)
            .filter(|e| self.fresh(e, now))
            .map(|e| e.profile.clone())
    }

    /// Store a profile. A live entry with a newer logical timestamp is kept.
    pub async fn insert(&self, profile: ProfileInfo) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let author = profile.provenance.author.clone();
        if let Some(existing) = entries.get(&author) {
            if self.fresh(existing, now)
                && existing.profile.provenance.created_at > profile.provenance.created_at
            {
                return;
            }
        }
        entries.insert(
            author,
            CachedProfile {
                profile,
                stored_at: now,
            },
        );
    }

    pub async fn invalidate(&self, author: &str) -> bool {
        self.entries.write().await.remove(author).is_some()
    }

    /// Drop expired entries. Returns how many were removed.
    pub async fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.stored_at) < self.ttl);
        before - entries.len()
    }

    /// The subset of `authors` with no live entry, deduplicated, in input order.
    pub async fn missing(&self, authors: &[String]) -> Vec<String> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let mut out: Vec<String> = Vec::new();
        for author in authors {
            let live = entries.get(author).is_some_and(|e| self.fresh(e, now));
            if !live && !out.contains(author) {
                out.push(author.clone());
            }
        }
        out
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use relaycast_common::Provenance;

    use super::*;

    fn profile(author: char, created_at: i64, name: &str) -> ProfileInfo {
        ProfileInfo {
            provenance: Provenance {
                id: format!("{created_at:064x}"),
                author: author.to_string().repeat(64),
                created_at,
                coordinate: None,
            },
            name: Some(name.to_string()),
            display_name: None,
            picture: None,
            about: None,
            lud16: None,
        }
    }

    #[tokio::test]
    async fn older_version_does_not_replace_newer() {
        let cache = ProfileCache::new(Duration::from_secs(60));
        cache.insert(profile('a', 200, "new")).await;
        cache.insert(profile('a', 100, "old")).await;
        let got = cache.get(&"a".repeat(64)).await.unwrap();
        assert_eq!(got.name.as_deref(), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = ProfileCache::new(Duration::from_secs(10));
        cache.insert(profile('a', 1, "moth")).await;
        assert!(cache.get(&"a".repeat(64)).await.is_some());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cache.get(&"a".repeat(64)).await.is_none());
        assert_eq!(cache.missing(&["a".repeat(64)]).await.len(), 1);
        assert_eq!(cache.prune_expired().await, 1);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn missing_skips_cached_and_dedups() {
        let cache = ProfileCache::new(Duration::from_secs(60));
        cache.insert(profile('a', 1, "moth")).await;
        let wanted = vec!["a".repeat(64), "b".repeat(64), "b".repeat(64)];
        assert_eq!(cache.missing(&wanted).await, vec!["b".repeat(64)]);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = ProfileCache::new(Duration::from_secs(60));
        cache.insert(profile('a', 1, "moth")).await;
        assert!(cache.invalidate(&"a".repeat(64)).await);
        assert!(cache.get(&"a".repeat(64)).await.is_none());
    }
}

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::ConfigError;

/// Pipeline configuration loaded from `RELAYCAST_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Sources
    pub sources: Vec<String>,
    pub source_timeout: Duration,

    // Snapshot output
    pub snapshot_dir: PathBuf,
    pub collection_cap: usize,
    pub per_item_cap: usize,

    // Trending
    pub trending_limit: usize,
    pub per_author_cap: usize,
    pub window_days: f64,
    pub weight_amount: f64,
    pub weight_count: f64,
    pub weight_recency: f64,
    /// Coordinates or record ids already featured elsewhere.
    pub featured: Vec<String>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. `from_env` is this
    /// with `std::env::var`; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let sources = list(&lookup, "RELAYCAST_SOURCES");
        if sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        Ok(Self {
            sources,
            source_timeout: Duration::from_millis(parsed(&lookup, "RELAYCAST_SOURCE_TIMEOUT_MS", 4_000)?),
            snapshot_dir: lookup("RELAYCAST_SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("snapshots")),
            collection_cap: parsed(&lookup, "RELAYCAST_COLLECTION_CAP", 200)?,
            per_item_cap: parsed(&lookup, "RELAYCAST_PER_ITEM_CAP", 50)?,
            trending_limit: parsed(&lookup, "RELAYCAST_TRENDING_LIMIT", 12)?,
            per_author_cap: parsed(&lookup, "RELAYCAST_PER_AUTHOR_CAP", 2)?,
            window_days: positive(&lookup, "RELAYCAST_WINDOW_DAYS", 7.0)?,
            weight_amount: parsed(&lookup, "RELAYCAST_WEIGHT_AMOUNT", 0.6)?,
            weight_count: parsed(&lookup, "RELAYCAST_WEIGHT_COUNT", 0.25)?,
            weight_recency: parsed(&lookup, "RELAYCAST_WEIGHT_RECENCY", 0.15)?,
            featured: list(&lookup, "RELAYCAST_FEATURED"),
        })
    }

    /// Log the effective configuration. Source URLs are logged by host only.
    pub fn log_summary(&self) {
        let hosts: Vec<&str> = self.sources.iter().map(|s| host_of(s)).collect();
        info!(
            sources = ?hosts,
            timeout_ms = self.source_timeout.as_millis() as u64,
            snapshot_dir = %self.snapshot_dir.display(),
            trending_limit = self.trending_limit,
            per_author_cap = self.per_author_cap,
            "Loaded relaycast config"
        );
    }
}

fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    rest.split(['/', '?']).next().unwrap_or(rest)
}

fn list<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Vec<String> {
    lookup(key)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn positive<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &str,
    default: f64,
) -> Result<f64, ConfigError> {
    let v: f64 = parsed(lookup, key, default)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: "must be greater than zero".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn missing_sources_is_fatal() {
        assert_eq!(Config::from_lookup(lookup(&[])).unwrap_err(), ConfigError::NoSources);
        assert_eq!(
            Config::from_lookup(lookup(&[("RELAYCAST_SOURCES", " , ")])).unwrap_err(),
            ConfigError::NoSources
        );
    }

    #[test]
    fn defaults_match_documented_values() {
        let config =
            Config::from_lookup(lookup(&[("RELAYCAST_SOURCES", "https://a.example, https://b.example")]))
                .unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.trending_limit, 12);
        assert_eq!(config.per_author_cap, 2);
        assert_eq!(config.window_days, 7.0);
        assert_eq!(config.weight_amount, 0.6);
        assert_eq!(config.weight_count, 0.25);
        assert_eq!(config.weight_recency, 0.15);
        assert_eq!(config.source_timeout, Duration::from_millis(4_000));
    }

    #[test]
    fn unparseable_number_names_the_key() {
        let err = Config::from_lookup(lookup(&[
            ("RELAYCAST_SOURCES", "https://a.example"),
            ("RELAYCAST_TRENDING_LIMIT", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "RELAYCAST_TRENDING_LIMIT"));
    }

    #[test]
    fn zero_window_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("RELAYCAST_SOURCES", "https://a.example"),
            ("RELAYCAST_WINDOW_DAYS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn unrelated_keys_are_ignored() {
        let config = Config::from_lookup(lookup(&[
            ("RELAYCAST_SOURCES", "https://a.example"),
            ("RELAYCAST_PROFILE_TTL_SECS", "not-a-number"),
        ]))
        .unwrap();
        assert_eq!(config.sources, vec!["https://a.example"]);
    }

    #[test]
    fn host_strips_scheme_and_path() {
        assert_eq!(host_of("https://relay.example/query?x=1"), "relay.example");
        assert_eq!(host_of("relay.example"), "relay.example");
    }
}

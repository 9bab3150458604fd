//! Record sources: independent endpoints that answer a SourceQuery.
//!
//! RecordSource is the only seam the fan-out sees. HttpSource is the
//! production implementation; tests use the mocks in `testing`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use relaycast_common::{RawRecord, SourceQuery};

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Address used in logs, events, and snapshot metadata.
    fn name(&self) -> &str;

    /// Run one query. No retries; the caller decides what to do on error.
    async fn query(&self, query: &SourceQuery) -> Result<Vec<RawRecord>>;
}

/// Source reachable over HTTP: POSTs the query as JSON to `<base>/query`
/// and expects a JSON array of raw records back.
pub struct HttpSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSource {
    /// The client carries its own transport timeout as a backstop; the
    /// fan-out applies the real per-source bound.
    pub fn new(base_url: &str, transport_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(transport_timeout)
            .build()
            .context("Failed to build source HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/query", self.base_url)
    }
}

#[async_trait]
impl RecordSource for HttpSource {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn query(&self, query: &SourceQuery) -> Result<Vec<RawRecord>> {
        let resp = self
            .client
            .post(self.endpoint())
            .header("User-Agent", "relaycast-aggregator/0.1")
            .json(query)
            .send()
            .await
            .with_context(|| format!("Query to {} failed", self.base_url))?;

        let resp = resp
            .error_for_status()
            .with_context(|| format!("Source {} returned an error status", self.base_url))?;

        resp.json::<Vec<RawRecord>>()
            .await
            .with_context(|| format!("Failed to decode records from {}", self.base_url))
    }
}

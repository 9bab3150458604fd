//! Source pool fan-out.
//!
//! Every source gets the same query at the same time, each under its own
//! timeout. A failed or timed-out source contributes nothing; the fan-out as a
//! whole only fails for configuration problems, never for source problems.

use std::sync::Arc;
use std::time::{Duration, Instant};

use relaycast_common::{ConfigError, Filter, PipelineEvent, RawRecord};

use crate::events::{EventSink, TracingSink};
use crate::source::RecordSource;

/// What happened to one source during a fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Ok { source: String, records: usize },
    Failed { source: String, error: String },
    TimedOut { source: String },
}

impl SourceOutcome {
    pub fn source(&self) -> &str {
        match self {
            SourceOutcome::Ok { source, .. }
            | SourceOutcome::Failed { source, .. }
            | SourceOutcome::TimedOut { source } => source,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, SourceOutcome::Ok { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct FanoutResult {
    /// Union of every successful source's records, in source order. Not
    /// deduplicated.
    pub records: Vec<RawRecord>,
    pub outcomes: Vec<SourceOutcome>,
    /// True when at least one source failed or timed out.
    pub degraded: bool,
    /// True when at least one source returned as many records as the query
    /// limit allowed, so its answer may be cut short.
    pub saturated: bool,
}

impl FanoutResult {
    pub fn sources_used(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| o.is_ok())
            .map(|o| o.source().to_string())
            .collect()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SourceOutcome::Failed { .. }))
            .count()
    }

    pub fn timed_out(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SourceOutcome::TimedOut { .. }))
            .count()
    }

    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| !o.is_ok())
    }
}

pub struct SourcePool {
    sources: Vec<Arc<dyn RecordSource>>,
    timeout: Duration,
    events: Arc<dyn EventSink>,
}

impl SourcePool {
    /// Zero sources is a configuration error: nothing downstream can work.
    pub fn new(sources: Vec<Arc<dyn RecordSource>>, timeout: Duration) -> Result<Self, ConfigError> {
        if sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        Ok(Self {
            sources,
            timeout,
            events: Arc::new(TracingSink),
        })
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Query every source concurrently and return the union of what came back.
    pub async fn fetch(&self, filter: &Filter) -> FanoutResult {
        let query = filter.to_query();
        let timeout = self.timeout;
        let limit = query.limit;

        let calls = self.sources.iter().map(|source| {
            let query = &query;
            async move {
                let started = Instant::now();
                // Dropping the timed-out future discards any late result.
                match tokio::time::timeout(timeout, source.query(query)).await {
                    Ok(Ok(records)) => {
                        self.events.emit(PipelineEvent::SourceQueried {
                            source: source.name().to_string(),
                            records: records.len(),
                            elapsed_ms: started.elapsed().as_millis() as u64,
                        });
                        if let Some(limit) = limit.filter(|l| records.len() >= *l) {
                            self.events.emit(PipelineEvent::SourceSaturated {
                                source: source.name().to_string(),
                                limit,
                            });
                        }
                        (
                            SourceOutcome::Ok {
                                source: source.name().to_string(),
                                records: records.len(),
                            },
                            records,
                        )
                    }
                    Ok(Err(e)) => {
                        self.events.emit(PipelineEvent::SourceFailed {
                            source: source.name().to_string(),
                            error: format!("{e:#}"),
                        });
                        (
                            SourceOutcome::Failed {
                                source: source.name().to_string(),
                                error: format!("{e:#}"),
                            },
                            Vec::new(),
                        )
                    }
                    Err(_) => {
                        self.events.emit(PipelineEvent::SourceTimedOut {
                            source: source.name().to_string(),
                            timeout_ms: timeout.as_millis() as u64,
                        });
                        (
                            SourceOutcome::TimedOut {
                                source: source.name().to_string(),
                            },
                            Vec::new(),
                        )
                    }
                }
            }
        });

        let settled = futures::future::join_all(calls).await;

        let mut result = FanoutResult::default();
        for (outcome, records) in settled {
            result.degraded |= !outcome.is_ok();
            result.saturated |= limit.is_some_and(|l| records.len() >= l);
            result.outcomes.push(outcome);
            result.records.extend(records);
        }

        self.events.emit(PipelineEvent::FanoutCompleted {
            sources: result.outcomes.len(),
            failed: result.failed() + result.timed_out(),
            records: result.records.len(),
        });

        result
    }
}

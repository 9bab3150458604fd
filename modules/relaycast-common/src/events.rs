//! Operational events emitted by the pipeline.
//!
//! The pipeline never logs directly from its core logic; it emits these to an
//! event sink, and the sink decides how to surface them (tracing, metrics,
//! test capture).

use serde::{Deserialize, Serialize};

use crate::types::RecordKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Debug,
    Info,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    SourceQueried {
        source: String,
        records: usize,
        elapsed_ms: u64,
    },

    SourceFailed {
        source: String,
        error: String,
    },

    SourceTimedOut {
        source: String,
        timeout_ms: u64,
    },

    /// A source answered with exactly as many records as the limit allowed.
    SourceSaturated {
        source: String,
        limit: usize,
    },

    FanoutCompleted {
        sources: usize,
        failed: usize,
        records: usize,
    },

    RecordRejected {
        id: String,
        kind: u32,
        reason: String,
    },

    Deduplicated {
        kind: RecordKind,
        input: usize,
        output: usize,
    },

    Ranked {
        candidates: usize,
        excluded: usize,
        capped: usize,
        output: usize,
    },

    ArtifactWritten {
        name: String,
        items: usize,
    },

    ArtifactFallback {
        name: String,
        error: String,
    },

    ArtifactLost {
        name: String,
        error: String,
    },
}

impl PipelineEvent {
    pub fn level(&self) -> Level {
        match self {
            PipelineEvent::RecordRejected { .. } | PipelineEvent::SourceQueried { .. } => {
                Level::Debug
            }
            PipelineEvent::SourceFailed { .. }
            | PipelineEvent::SourceTimedOut { .. }
            | PipelineEvent::SourceSaturated { .. }
            | PipelineEvent::ArtifactFallback { .. }
            | PipelineEvent::ArtifactLost { .. } => Level::Warn,
            PipelineEvent::FanoutCompleted { .. }
            | PipelineEvent::Deduplicated { .. }
            | PipelineEvent::Ranked { .. }
            | PipelineEvent::ArtifactWritten { .. } => Level::Info,
        }
    }
}

//! Event sinks: where PipelineEvents go.
//!
//! TracingSink: default; maps each event to a leveled tracing record.
//! MemorySink: collects events in order for assertions.

use std::sync::Mutex;

use relaycast_common::events::Level;
use relaycast_common::PipelineEvent;
use tracing::{debug, info, warn};

pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: PipelineEvent) {
        let level = event.level();
        let fields = serde_json::to_string(&event).unwrap_or_default();
        match level {
            Level::Debug => debug!(target: "relaycast::pipeline", event = %fields),
            Level::Info => info!(target: "relaycast::pipeline", event = %fields),
            Level::Warn => warn!(target: "relaycast::pipeline", event = %fields),
        }
    }
}

/// Records every event. Cheap enough for tests and for embedding callers
/// that want to inspect a run after the fact.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

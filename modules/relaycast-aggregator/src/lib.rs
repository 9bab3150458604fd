pub mod convert;
pub mod dedup;
pub mod engagement;
pub mod events;
pub mod fanout;
pub mod pipeline;
pub mod profiles;
pub mod snapshot;
pub mod source;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod trending;

pub use fanout::{FanoutResult, SourceOutcome, SourcePool};
pub use pipeline::{Aggregator, Collected, Ranked, SnapshotRun};
pub use snapshot::{FsSink, SnapshotInput, SnapshotWriter, WriteReport};
pub use source::{HttpSource, RecordSource};
pub use trending::{Exclusions, TrendingParams};

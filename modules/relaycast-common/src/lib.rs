pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod filter;
pub mod snapshot;
pub mod types;

pub use config::Config;
pub use domain::*;
pub use error::{ConfigError, RelaycastError};
pub use events::PipelineEvent;
pub use filter::{Filter, SourceQuery};
pub use snapshot::*;
pub use types::*;

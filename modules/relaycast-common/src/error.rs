use thiserror::Error;

/// Fatal configuration problems. The pipeline refuses to start on any of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("No sources configured: at least one source endpoint is required")]
    NoSources,

    #[error("{key} is required")]
    Missing { key: String },

    #[error("{key} is invalid: {reason}")]
    Invalid { key: String, reason: String },
}

#[derive(Error, Debug)]
pub enum RelaycastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

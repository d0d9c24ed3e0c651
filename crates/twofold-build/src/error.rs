//! Error types for build orchestration.

use twofold_config::ConfigError;

use crate::store::StoreError;

/// Errors surfaced by the orchestrator and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A compile pass finished with diagnostics in a context that does not
    /// tolerate them.
    #[error("compilation failed:\n{details}")]
    Compile { details: String },

    /// Configuration synthesis failed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The file watcher could not be set up.
    #[error("watch setup failed: {0}")]
    WatchSetup(#[from] notify::Error),

    /// Artifact store read or write failed.
    #[error("artifact store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Failure inside an injected compile engine.
    #[error("compile engine error: {0}")]
    Engine(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BuildError>;

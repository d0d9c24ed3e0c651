//! Compile engine seam.
//!
//! The orchestrator drives any engine implementing [`Compiler`]. An engine
//! receives one frozen target configuration and the artifact store, runs one
//! pass, and reports what it produced. `Err` means the engine itself broke;
//! source-level problems come back as diagnostics on an `Ok` result.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use twofold_config::{Target, TargetConfig};

use crate::store::ArtifactStore;

/// One source-level problem reported by a compile pass.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
        }
    }

    pub fn in_file(message: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            message: message.into(),
            file: Some(file.into()),
        }
    }
}

/// Outcome of one compile pass over one target.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub target: Target,
    pub diagnostics: Vec<Diagnostic>,
    /// Entry name to emitted asset paths, in entry-map order. Paths are
    /// relative to the store root.
    pub entrypoints: IndexMap<String, Vec<String>>,
    /// Every artifact path written during the pass.
    pub assets: Vec<String>,
    pub duration_ms: u64,
}

impl CompileResult {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            diagnostics: Vec::new(),
            entrypoints: IndexMap::new(),
            assets: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    /// A pass succeeded when it produced no diagnostics.
    pub fn success(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Render diagnostics one per line for error reporting.
    pub fn format_diagnostics(&self) -> String {
        self.diagnostics
            .iter()
            .map(|d| match &d.file {
                Some(file) => format!("{}: {}", file.display(), d.message),
                None => d.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A compile engine for one target configuration.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Run one pass. Artifacts go to `store`; source problems come back as
    /// diagnostics, engine failures as `Err`.
    async fn compile(
        &self,
        config: &TargetConfig,
        store: Arc<dyn ArtifactStore>,
    ) -> anyhow::Result<CompileResult>;
}

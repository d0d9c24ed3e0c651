//! Two-target build orchestration.
//!
//! Given a set of [`twofold_config::BuildOptions`] and a compile engine
//! implementing [`Compiler`], the [`CompileOrchestrator`] runs either a
//! single production pass over both targets or a development session with
//! watch-driven rebuilds, in-memory asset serving and hot-update delivery.

pub mod compiler;
pub mod dev;
pub mod error;
pub mod events;
#[cfg(feature = "logging")]
pub mod logging;
pub mod manifest;
pub mod orchestrator;
pub mod store;
pub mod watcher;

pub use compiler::{CompileResult, Compiler, Diagnostic};
pub use dev::{DevMiddleware, HotStage};
pub use error::{BuildError, Result};
pub use events::{BuildEvent, EventChannel};
pub use manifest::Manifest;
pub use orchestrator::{BuildOutcome, CompileOrchestrator, DevSession, TargetState};
pub use store::{ArtifactStore, DiskStore, MemoryStore, StoreError};
pub use watcher::{FileChange, FileWatcher};

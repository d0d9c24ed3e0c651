//! Build lifecycle orchestration.
//!
//! One orchestrator drives one compile engine over both target
//! configurations. Production runs a single concurrent pass over both
//! targets and rejects on any diagnostic. Development runs the first passes,
//! publishes the dev middleware, then keeps both targets rebuilding from
//! file-change events until shut down.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::task::JoinHandle;
use twofold_config::{build_configs, BuildOptions, Mode, Target, TargetConfig, TargetConfigs};

use crate::compiler::{CompileResult, Compiler};
use crate::dev::DevMiddleware;
use crate::error::{BuildError, Result};
use crate::events::{BuildEvent, EventChannel};
use crate::manifest;
use crate::store::{ArtifactStore, DiskStore, MemoryStore};
use crate::watcher::FileWatcher;

/// Lifecycle state of one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// No pass has run yet.
    Pending,
    /// The production pass finished.
    FirstPassDone,
    /// Development watch loop is live.
    Watching,
    /// The engine failed; terminal.
    Failed,
}

type StateMap = Arc<RwLock<FxHashMap<Target, TargetState>>>;

/// Record a state transition. `Failed` is terminal: once a target fails no
/// later transition revives it.
fn advance(states: &StateMap, target: Target, next: TargetState) {
    let mut states = states.write();
    let current = states.get(&target).copied().unwrap_or(TargetState::Pending);
    if current == TargetState::Failed {
        return;
    }
    states.insert(target, next);
}

/// Whether a first pass resolves the target.
///
/// Development tolerates client diagnostics: the hot overlay surfaces them
/// in the browser and watch mode recovers on the next save. Everything else
/// must compile clean.
fn first_pass_resolved(mode: Mode, target: Target, result: &CompileResult) -> bool {
    match (mode, target) {
        (Mode::Development, Target::Client) => true,
        (Mode::Development, Target::Server) => result.success(),
        (Mode::Production, _) => result.success(),
    }
}

/// Result of [`CompileOrchestrator::build`].
pub enum BuildOutcome {
    /// Production pass over both targets.
    Production {
        client: Arc<CompileResult>,
        server: Arc<CompileResult>,
    },
    /// Development session with live watch loops.
    Development(DevSession),
}

impl std::fmt::Debug for BuildOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production { client, server } => f
                .debug_struct("Production")
                .field("client", client)
                .field("server", server)
                .finish(),
            Self::Development(_) => f.debug_struct("Development").finish_non_exhaustive(),
        }
    }
}

/// Handle over a running development session. Dropping it stops the watch
/// loops.
pub struct DevSession {
    pub middleware: DevMiddleware,
    tasks: Vec<JoinHandle<()>>,
}

impl DevSession {
    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for DevSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Drives one compile engine through the build lifecycle of both targets.
pub struct CompileOrchestrator {
    options: BuildOptions,
    configs: TargetConfigs,
    compiler: Arc<dyn Compiler>,
    store: Arc<dyn ArtifactStore>,
    events: EventChannel,
    states: StateMap,
    middleware_published: Arc<AtomicBool>,
}

impl CompileOrchestrator {
    /// Build both target configurations and pick the artifact store: shared
    /// memory in development, the build directory on disk in production.
    pub fn new(options: BuildOptions, compiler: Arc<dyn Compiler>) -> Result<Self> {
        let configs = build_configs(&options)?;
        let store: Arc<dyn ArtifactStore> = match options.mode {
            Mode::Development => Arc::new(MemoryStore::new()),
            Mode::Production => Arc::new(DiskStore::new(options.dirs.build_dir())),
        };

        let states: StateMap = Arc::new(RwLock::new(
            [Target::Client, Target::Server]
                .into_iter()
                .map(|t| (t, TargetState::Pending))
                .collect(),
        ));

        Ok(Self {
            options,
            configs,
            compiler,
            store,
            events: EventChannel::new(),
            states,
            middleware_published: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn events(&self) -> EventChannel {
        self.events.clone()
    }

    pub fn configs(&self) -> &TargetConfigs {
        &self.configs
    }

    pub fn store(&self) -> Arc<dyn ArtifactStore> {
        self.store.clone()
    }

    pub fn state(&self, target: Target) -> TargetState {
        self.states
            .read()
            .get(&target)
            .copied()
            .unwrap_or(TargetState::Pending)
    }

    /// Run the lifecycle for the configured mode.
    pub async fn build(&self) -> Result<BuildOutcome> {
        match self.options.mode {
            Mode::Production => self.build_production().await,
            Mode::Development => self.build_development().await,
        }
    }

    /// One concurrent pass over both targets. Any diagnostic on either
    /// target rejects the whole build with both targets' output aggregated.
    async fn build_production(&self) -> Result<BuildOutcome> {
        tracing::info!("starting production build");

        let (client, server) = tokio::join!(
            self.compiler.compile(&self.configs.client, self.store.clone()),
            self.compiler.compile(&self.configs.server, self.store.clone()),
        );
        let client = Arc::new(client.map_err(BuildError::Engine)?);
        let server = Arc::new(server.map_err(BuildError::Engine)?);

        let mut details = String::new();
        for result in [&client, &server] {
            if !result.success() {
                if !details.is_empty() {
                    details.push('\n');
                }
                details.push_str(&format!(
                    "{}:\n{}",
                    result.target,
                    result.format_diagnostics()
                ));
            }
        }
        if !details.is_empty() {
            advance(&self.states, Target::Client, TargetState::Failed);
            advance(&self.states, Target::Server, TargetState::Failed);
            return Err(BuildError::Compile { details });
        }

        self.write_manifest(&client).await?;

        advance(&self.states, Target::Client, TargetState::FirstPassDone);
        advance(&self.states, Target::Server, TargetState::FirstPassDone);
        self.events.emit(BuildEvent::Done {
            target: Target::Client,
            result: client.clone(),
        });
        self.events.emit(BuildEvent::Done {
            target: Target::Server,
            result: server.clone(),
        });

        tracing::info!(
            client_ms = client.duration_ms,
            server_ms = server.duration_ms,
            "production build complete"
        );
        Ok(BuildOutcome::Production { client, server })
    }

    /// First passes, middleware publication, then one watch loop per target.
    async fn build_development(&self) -> Result<BuildOutcome> {
        tracing::info!("starting development build");

        let middleware = DevMiddleware::new(
            self.options.build.public_path.clone(),
            self.store.clone(),
        );
        self.subscribe_hot_updates(&middleware);

        let (client, server) = tokio::join!(
            self.compiler.compile(&self.configs.client, self.store.clone()),
            self.compiler.compile(&self.configs.server, self.store.clone()),
        );
        let client = Arc::new(client.map_err(BuildError::Engine)?);
        let server = Arc::new(server.map_err(BuildError::Engine)?);

        if !first_pass_resolved(Mode::Development, Target::Server, &server) {
            advance(&self.states, Target::Server, TargetState::Failed);
            return Err(BuildError::Compile {
                details: format!("server:\n{}", server.format_diagnostics()),
            });
        }
        if !client.success() {
            tracing::warn!(
                "client compiled with {} diagnostic(s); continuing in watch mode",
                client.diagnostics.len()
            );
        }

        self.write_manifest(&client).await?;

        self.events.emit(BuildEvent::Done {
            target: Target::Client,
            result: client,
        });
        self.events.emit(BuildEvent::Done {
            target: Target::Server,
            result: server,
        });

        if !self.middleware_published.swap(true, Ordering::SeqCst) {
            self.events.emit(BuildEvent::Middleware(middleware.clone()));
        }

        let tasks = vec![
            self.spawn_watch_loop(Target::Client)?,
            self.spawn_watch_loop(Target::Server)?,
        ];

        Ok(BuildOutcome::Development(DevSession { middleware, tasks }))
    }

    /// Rebuild one target on every change under the source tree.
    fn spawn_watch_loop(&self, target: Target) -> Result<JoinHandle<()>> {
        let (watcher, mut rx) =
            FileWatcher::new(self.options.dirs.source_dir(), &self.options.build.watch)?;

        let compiler = self.compiler.clone();
        let config: TargetConfig = self.configs.get(target).clone();
        let store = self.store.clone();
        let events = self.events.clone();
        let states = self.states.clone();
        let manifest_path = self.options.build.manifest.clone();
        let public_path = self.options.build.public_path.clone();

        advance(&self.states, target, TargetState::Watching);

        let handle = tokio::spawn(async move {
            // Owns the watcher so the notify stream stays alive.
            let _watcher = watcher;

            while let Some(change) = rx.recv().await {
                tracing::info!(
                    %target,
                    path = %change.path().display(),
                    "change detected, rebuilding"
                );

                let result = match compiler.compile(&config, store.clone()).await {
                    Ok(result) => Arc::new(result),
                    Err(e) => {
                        tracing::error!(%target, "compile engine failed: {e}");
                        advance(&states, target, TargetState::Failed);
                        return;
                    }
                };

                if target == Target::Server && !result.success() {
                    tracing::warn!(
                        "server rebuild produced {} diagnostic(s); keeping previous bundle",
                        result.diagnostics.len()
                    );
                    continue;
                }

                if target == Target::Client {
                    let manifest = manifest::generate(&result, &public_path);
                    if let Err(e) =
                        manifest::write(store.as_ref(), Path::new(&manifest_path), &manifest).await
                    {
                        tracing::error!("manifest rewrite failed: {e}");
                    }
                }

                events.emit(BuildEvent::Done { target, result });
            }
        });

        Ok(handle)
    }

    /// Every client pass pushes a hot-update notification to connected
    /// browsers. Diagnostics ride along so the overlay can render them.
    fn subscribe_hot_updates(&self, middleware: &DevMiddleware) {
        let hot = middleware.hot().clone();
        self.events.subscribe(move |event| {
            if let BuildEvent::Done { target, result } = event {
                if *target != Target::Client {
                    return;
                }
                let payload = serde_json::json!({
                    "action": "built",
                    "durationMs": result.duration_ms,
                    "errors": result
                        .diagnostics
                        .iter()
                        .map(|d| d.message.clone())
                        .collect::<Vec<_>>(),
                });
                hot.broadcast(&payload.to_string());
            }
        });
    }

    async fn write_manifest(&self, client: &CompileResult) -> Result<()> {
        let manifest = manifest::generate(client, &self.options.build.public_path);
        manifest::write(
            self.store.as_ref(),
            Path::new(&self.options.build.manifest),
            &manifest,
        )
        .await
    }
}

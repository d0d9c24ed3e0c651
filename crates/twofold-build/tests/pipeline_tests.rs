use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use twofold_build::{
    ArtifactStore, BuildError, BuildEvent, BuildOutcome, CompileOrchestrator, CompileResult,
    Compiler, Diagnostic, TargetState,
};
use twofold_config::{BuildOptions, Mode, Target, TargetConfig, WatchSettings};

/// Minimal engine: one artifact per entry, scripted diagnostics per target.
#[derive(Default)]
struct StubEngine {
    client_diagnostics: Vec<Diagnostic>,
    server_diagnostics: Vec<Diagnostic>,
}

#[async_trait]
impl Compiler for StubEngine {
    async fn compile(
        &self,
        config: &TargetConfig,
        store: Arc<dyn ArtifactStore>,
    ) -> anyhow::Result<CompileResult> {
        let mut result = CompileResult::new(config.target);
        for name in config.entry.keys() {
            let asset = format!("{name}.js");
            store.write(Path::new(&asset), b"compiled".to_vec()).await?;
            result.entrypoints.insert(name.clone(), vec![asset.clone()]);
            result.assets.push(asset);
        }
        result.diagnostics = match config.target {
            Target::Client => self.client_diagnostics.clone(),
            Target::Server => self.server_diagnostics.clone(),
        };
        Ok(result)
    }
}

fn create_app_project() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    let pages = dir.path().join("src/pages");
    fs::create_dir_all(&pages).expect("create pages");
    fs::write(pages.join("index.js"), "export default () => null").expect("write index.js");
    fs::write(pages.join("about.js"), "export default () => null").expect("write about.js");
    dir
}

fn options(root: &Path, mode: Mode) -> BuildOptions {
    BuildOptions::new(root).mode(mode).watch(WatchSettings {
        debounce_ms: 0,
        ignored: vec!["node_modules".to_string()],
    })
}

#[tokio::test]
async fn production_pipeline_lands_on_disk() {
    let project = create_app_project();
    let orchestrator = CompileOrchestrator::new(
        options(project.path(), Mode::Production),
        Arc::new(StubEngine::default()),
    )
    .expect("orchestrator");

    let outcome = orchestrator.build().await.expect("build");
    let BuildOutcome::Production { client, server } = outcome else {
        panic!("expected production outcome");
    };
    assert!(client.success());
    assert!(server.success());

    let build_dir = project.path().join(".twofold");
    assert!(build_dir.join("index.js").is_file());
    assert!(build_dir.join("about.js").is_file());
    assert!(build_dir.join("server/index.js").is_file());
    assert!(build_dir.join("server/_document.js").is_file());

    // IndexMap keeps the written key order; a plain JSON value would not.
    let manifest: indexmap::IndexMap<String, Vec<String>> =
        serde_json::from_slice(&fs::read(build_dir.join("manifest.json")).expect("manifest"))
            .expect("manifest json");
    let names: Vec<_> = manifest.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["index", "about", "_error"]);
}

#[tokio::test]
async fn production_pipeline_rejects_on_any_diagnostic() {
    let project = create_app_project();
    let engine = StubEngine {
        client_diagnostics: vec![Diagnostic::in_file(
            "unexpected token",
            "src/pages/about.js",
        )],
        ..Default::default()
    };
    let orchestrator =
        CompileOrchestrator::new(options(project.path(), Mode::Production), Arc::new(engine))
            .expect("orchestrator");

    let err = orchestrator.build().await.expect_err("must reject");
    let BuildError::Compile { details } = err else {
        panic!("expected compile failure, got: {err}");
    };
    assert!(details.contains("client:"));
    assert!(details.contains("src/pages/about.js: unexpected token"));
}

#[tokio::test]
async fn dev_pipeline_serves_from_memory_and_rebuilds() {
    let project = create_app_project();
    let orchestrator = CompileOrchestrator::new(
        options(project.path(), Mode::Development),
        Arc::new(StubEngine::default()),
    )
    .expect("orchestrator");

    let (tx, mut events) = tokio::sync::mpsc::unbounded_channel();
    orchestrator.events().subscribe(move |event| {
        let _ = tx.send(event.clone());
    });

    let outcome = orchestrator.build().await.expect("build");
    let BuildOutcome::Development(session) = outcome else {
        panic!("expected development outcome");
    };
    assert_eq!(orchestrator.state(Target::Client), TargetState::Watching);
    assert_eq!(orchestrator.state(Target::Server), TargetState::Watching);

    // Nothing reached the project's build directory.
    assert!(!project.path().join(".twofold").exists());

    // Bundles and the manifest come straight out of memory.
    let served = session
        .middleware
        .handle("/index.js")
        .await
        .expect("bundle served");
    assert_eq!(served.status(), 200);
    let manifest = session
        .middleware
        .handle("/manifest.json")
        .await
        .expect("manifest served");
    assert_eq!(manifest.status(), 200);

    // Drain the first-pass events: two done signals and one middleware.
    let mut done = 0;
    let mut middleware = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            BuildEvent::Done { .. } => done += 1,
            BuildEvent::Middleware(_) => middleware += 1,
        }
    }
    assert_eq!(done, 2);
    assert_eq!(middleware, 1);

    // Touching a page file triggers a fresh pass.
    fs::write(
        project.path().join("src/pages/index.js"),
        "export default () => <p>edited</p>",
    )
    .expect("edit page");
    let rebuilt = tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("no rebuild observed")
        .expect("event channel closed");
    assert!(matches!(rebuilt, BuildEvent::Done { .. }));

    session.shutdown();
}

#[tokio::test]
async fn dev_pipeline_rejects_on_server_first_pass_failure() {
    let project = create_app_project();
    let engine = StubEngine {
        server_diagnostics: vec![Diagnostic::new("cannot resolve module 'fs2'")],
        ..Default::default()
    };
    let orchestrator =
        CompileOrchestrator::new(options(project.path(), Mode::Development), Arc::new(engine))
            .expect("orchestrator");

    let err = orchestrator.build().await.expect_err("must reject");
    assert!(matches!(err, BuildError::Compile { .. }));
    assert_eq!(orchestrator.state(Target::Server), TargetState::Failed);
}

//! Normalized build options.
//!
//! `BuildOptions` is assembled once by an external configuration loader and
//! read-only for the rest of the invocation. User-extensible points (filename
//! templates, the extend hook, transform plugin/preset overrides) are plain
//! closures behind `Arc`; a panic inside one aborts configuration assembly
//! with no recovery.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::mode::{EnvFlags, Mode, Target};
use crate::target::TargetConfig;

/// Function form of a filename template, invoked with the environment flags.
pub type TemplateFn = Arc<dyn Fn(&EnvFlags) -> String + Send + Sync>;

/// A filename template: either a literal string or a function of the
/// environment flags.
#[derive(Clone)]
pub enum Template {
    Str(String),
    Fn(TemplateFn),
}

impl Template {
    pub fn resolve(&self, env: &EnvFlags) -> String {
        match self {
            Template::Str(s) => s.clone(),
            Template::Fn(f) => f(env),
        }
    }
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Template::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Template::Fn(_) => f.write_str("Fn(..)"),
        }
    }
}

impl From<&str> for Template {
    fn from(s: &str) -> Self {
        Template::Str(s.to_string())
    }
}

impl From<String> for Template {
    fn from(s: String) -> Self {
        Template::Str(s)
    }
}

/// User hook that receives the fully assembled config for a target and may
/// return a modified one. Applied last, after both strategy layers.
pub type ExtendHook = Arc<dyn Fn(TargetConfig, &EnvFlags) -> TargetConfig + Send + Sync>;

/// Hook replacing a default transform plugin/preset list wholesale.
pub type ListHook = Arc<dyn Fn(&EnvFlags, &[String]) -> Vec<String> + Send + Sync>;

/// Override for a computed transform list.
#[derive(Clone, Default)]
pub enum ListOverride {
    /// Use the built-in defaults.
    #[default]
    Default,
    /// Use this list verbatim.
    List(Vec<String>),
    /// Compute the list from the environment flags and the defaults.
    Hook(ListHook),
}

impl std::fmt::Debug for ListOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListOverride::Default => f.write_str("Default"),
            ListOverride::List(l) => f.debug_tuple("List").field(l).finish(),
            ListOverride::Hook(_) => f.write_str("Hook(..)"),
        }
    }
}

/// Directory layout of the project.
#[derive(Debug, Clone)]
pub struct DirLayout {
    /// Project root; all other directories are relative to it.
    pub root: PathBuf,
    /// Source tree, relative to `root`.
    pub src: String,
    /// Page directory, relative to `src`.
    pub page: String,
    /// Build output directory, relative to `root`.
    pub build: String,
    /// Static-asset subdirectory inside the build output (production only).
    pub statics: String,
}

impl DirLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            src: "src".to_string(),
            page: "pages".to_string(),
            build: ".twofold".to_string(),
            statics: "static".to_string(),
        }
    }

    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.src)
    }

    pub fn page_dir(&self) -> PathBuf {
        self.source_dir().join(&self.page)
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root.join(&self.build)
    }

    /// Dependency install directory.
    pub fn node_modules(&self) -> PathBuf {
        self.root.join("node_modules")
    }
}

/// Per-class output filename templates. `None` selects the mode-dependent
/// built-in default.
#[derive(Debug, Clone, Default)]
pub struct FilenameTemplates {
    pub app: Option<Template>,
    pub chunk: Option<Template>,
    pub css: Option<Template>,
    pub img: Option<Template>,
    pub font: Option<Template>,
    pub video: Option<Template>,
    pub css_modules_name: Option<Template>,
}

/// Watch-mode settings, forwarded to the development watch loops.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub debounce_ms: u64,
    /// Path prefixes and `*.ext` patterns excluded from change notifications.
    pub ignored: Vec<String>,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            ignored: vec!["node_modules".to_string()],
        }
    }
}

/// Source-transform settings for the script rule.
#[derive(Debug, Clone, Default)]
pub struct TransformSettings {
    /// Explicit external transform configuration. When set it is used
    /// verbatim and the computed plugin/preset lists are skipped.
    pub config_file: Option<PathBuf>,
    pub plugins: ListOverride,
    pub presets: ListOverride,
}

/// Build-section settings.
#[derive(Clone)]
pub struct BuildSettings {
    /// Public base path prefixed onto every emitted asset URL.
    pub public_path: String,
    pub watch: WatchSettings,
    /// Import alias map.
    pub alias: FxHashMap<String, String>,
    pub extend: Option<ExtendHook>,
    pub filenames: FilenameTemplates,
    pub transform: TransformSettings,
    /// Insert the lint rule ahead of the script rule.
    pub lint: bool,
    /// Subdirectory under the build output holding server bundles.
    pub server_dir: String,
    /// Manifest filename, relative to the build output directory.
    pub manifest: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            public_path: "/".to_string(),
            watch: WatchSettings::default(),
            alias: FxHashMap::default(),
            extend: None,
            filenames: FilenameTemplates::default(),
            transform: TransformSettings::default(),
            lint: false,
            server_dir: "server".to_string(),
            manifest: "manifest.json".to_string(),
        }
    }
}

impl std::fmt::Debug for BuildSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildSettings")
            .field("public_path", &self.public_path)
            .field("watch", &self.watch)
            .field("alias", &self.alias)
            .field("extend", &self.extend.as_ref().map(|_| ".."))
            .field("filenames", &self.filenames)
            .field("transform", &self.transform)
            .field("lint", &self.lint)
            .field("server_dir", &self.server_dir)
            .field("manifest", &self.manifest)
            .finish()
    }
}

/// Global identifiers injected into the page-wrapping transform.
#[derive(Debug, Clone)]
pub struct Globals {
    /// DOM mount-point id.
    pub id: String,
    /// Name of the serialized-state global.
    pub context: String,
}

impl Default for Globals {
    fn default() -> Self {
        Self {
            id: "twofold".to_string(),
            context: "__TWOFOLD__".to_string(),
        }
    }
}

/// Normalized, immutable build options for one invocation.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub mode: Mode,
    pub dirs: DirLayout,
    pub build: BuildSettings,
    /// User environment variables injected as compile-time constants.
    /// Ordered so the generated constant table is deterministic.
    pub env: BTreeMap<String, serde_json::Value>,
    pub globals: Globals,
    /// Page-file glob, matched relative to the page directory.
    pub pattern: String,
}

impl BuildOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            mode: Mode::Production,
            dirs: DirLayout::new(root),
            build: BuildSettings::default(),
            env: BTreeMap::new(),
            globals: Globals::default(),
            pattern: "**/*.{js,jsx}".to_string(),
        }
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn public_path(mut self, path: impl Into<String>) -> Self {
        self.build.public_path = path.into();
        self
    }

    pub fn env_var(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.env.insert(key.into(), value);
        self
    }

    pub fn alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.build.alias.insert(from.into(), to.into());
        self
    }

    pub fn lint(mut self, enabled: bool) -> Self {
        self.build.lint = enabled;
        self
    }

    pub fn extend(mut self, hook: ExtendHook) -> Self {
        self.build.extend = Some(hook);
        self
    }

    pub fn transform(mut self, transform: TransformSettings) -> Self {
        self.build.transform = transform;
        self
    }

    pub fn filenames(mut self, filenames: FilenameTemplates) -> Self {
        self.build.filenames = filenames;
        self
    }

    pub fn watch(mut self, watch: WatchSettings) -> Self {
        self.build.watch = watch;
        self
    }

    /// Environment flags for a target under these options.
    pub fn env_flags(&self, target: Target) -> EnvFlags {
        EnvFlags::new(self.mode, target)
    }
}

/// Probe `dir/{stem}.{ext}` for each extension in order, returning the first
/// existing file.
pub fn find_page_file(dir: &Path, stem: &str, extensions: &[&str]) -> Option<PathBuf> {
    for ext in extensions {
        let candidate = dir.join(format!("{stem}.{ext}"));
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

//! Per-target build configuration.
//!
//! One shared base plus two named strategy functions (`client_config`,
//! `server_config`) applied in a fixed, explicit order. The result is frozen:
//! a `TargetConfig` is built once per `build()` invocation and never mutated
//! afterwards. The user extend hook runs last and may replace the whole
//! value.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::assets::AssetPaths;
use crate::entries::{client_entries, server_entries, EntryMap};
use crate::error::Result;
use crate::mode::{EnvFlags, Mode, Platform, Target};
use crate::options::BuildOptions;
use crate::rules::{base_rules, page_wrap_rule, Rule};

/// Output location and filename spec for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub path: PathBuf,
    pub public_path: String,
    pub filename: String,
    pub chunk_filename: String,
    pub library: LibraryTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryTarget {
    /// Plain script output.
    None,
    /// CommonJS module export, for the server bundle.
    CommonJs,
}

/// Module resolution spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveSpec {
    pub extensions: Vec<String>,
    pub alias: BTreeMap<String, String>,
}

/// Whether dependency-install-directory modules are bundled or left external.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalsPolicy {
    Bundle,
    NodeModules,
}

/// Chunk scope a cache group applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkScope {
    Initial,
    Async,
}

/// Module predicate for a cache group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleTest {
    /// Script modules resolved under the given directory.
    ScriptUnder(PathBuf),
}

impl ModuleTest {
    pub fn matches(&self, resource: &Path) -> bool {
        match self {
            ModuleTest::ScriptUnder(dir) => {
                resource.extension().is_some_and(|ext| ext == "js") && resource.starts_with(dir)
            }
        }
    }
}

/// One code-splitting group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheGroup {
    pub name: String,
    pub scope: ChunkScope,
    pub test: Option<ModuleTest>,
    /// Minimum number of chunks a module must be reachable from.
    pub min_chunks: u32,
    pub priority: i32,
}

impl CacheGroup {
    pub fn matches(&self, resource: &Path, scope: ChunkScope, chunk_count: u32) -> bool {
        if self.scope != scope || chunk_count < self.min_chunks {
            return false;
        }
        match &self.test {
            Some(test) => test.matches(resource),
            None => true,
        }
    }
}

/// Script and stylesheet minification settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinifyOptions {
    pub drop_comments: bool,
    pub drop_debugger: bool,
    pub drop_console: bool,
    /// Restrict the stylesheet minifier to safe transforms.
    pub css_safe: bool,
}

/// Optimization strategy for one target.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Optimization {
    pub split_chunks: Vec<CacheGroup>,
    pub runtime_chunk: bool,
    pub minify: Option<MinifyOptions>,
}

impl Optimization {
    /// Classify a module into the cache group it belongs to, if any. Groups
    /// are consulted in descending priority order.
    pub fn group_for(
        &self,
        resource: &Path,
        scope: ChunkScope,
        chunk_count: u32,
    ) -> Option<&str> {
        let mut candidates: Vec<&CacheGroup> = self
            .split_chunks
            .iter()
            .filter(|g| g.matches(resource, scope, chunk_count))
            .collect();
        candidates.sort_by_key(|g| std::cmp::Reverse(g.priority));
        candidates.first().map(|g| g.name.as_str())
    }
}

/// Declarative plugin set carried by a frozen config.
#[derive(Debug, Clone, PartialEq)]
pub enum PluginSpec {
    /// Extract stylesheets into standalone files.
    ExtractCss {
        filename: String,
        chunk_filename: String,
    },
    /// Emit the entry-to-asset manifest after each compile pass.
    Manifest {
        path: PathBuf,
        public_path: String,
    },
    /// Development-only hot module replacement.
    HotModuleReplacement,
}

/// One complete, frozen build configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetConfig {
    pub target: Target,
    pub mode: Mode,
    pub platform: Platform,
    /// Source maps: development client only.
    pub source_maps: bool,
    pub entry: EntryMap,
    pub output: OutputSpec,
    pub rules: Vec<Rule>,
    pub resolve: ResolveSpec,
    /// Compile-time constant table. Values are code text: booleans and
    /// numbers render as bare tokens, everything else as JSON text.
    pub defines: BTreeMap<String, String>,
    pub plugins: Vec<PluginSpec>,
    pub externals: ExternalsPolicy,
    pub optimization: Optimization,
}

/// The two frozen configurations produced from one set of options.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetConfigs {
    pub client: TargetConfig,
    pub server: TargetConfig,
}

impl TargetConfigs {
    pub fn get(&self, target: Target) -> &TargetConfig {
        match target {
            Target::Client => &self.client,
            Target::Server => &self.server,
        }
    }
}

/// Build both target configurations from one set of options.
pub fn build_configs(options: &BuildOptions) -> Result<TargetConfigs> {
    Ok(TargetConfigs {
        client: client_config(options)?,
        server: server_config(options)?,
    })
}

/// Shared base configuration for one target.
fn base_config(options: &BuildOptions, target: Target) -> Result<TargetConfig> {
    let env = options.env_flags(target);
    let assets = AssetPaths::resolve(options, &env);

    let source_maps = match (options.mode, target) {
        (Mode::Development, Target::Client) => true,
        (Mode::Development, Target::Server) => false,
        (Mode::Production, _) => false,
    };

    let mut alias: BTreeMap<String, String> = options
        .build
        .alias
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if options.mode.is_dev() {
        alias.insert(
            "react-dom".to_string(),
            "@hot-loader/react-dom".to_string(),
        );
    }

    let entry = match target {
        Target::Client => client_entries(options)?,
        Target::Server => server_entries(options)?,
    };

    Ok(TargetConfig {
        target,
        mode: options.mode,
        platform: target.platform(),
        source_maps,
        entry,
        output: OutputSpec {
            path: options.dirs.build_dir(),
            public_path: options.build.public_path.clone(),
            filename: assets.app.clone(),
            chunk_filename: assets.chunk.clone(),
            library: LibraryTarget::None,
        },
        rules: base_rules(options, &env, &assets),
        resolve: ResolveSpec {
            extensions: vec![".js".to_string(), ".jsx".to_string(), ".json".to_string()],
            alias,
        },
        defines: defines(options, &env),
        plugins: vec![PluginSpec::ExtractCss {
            filename: assets.css.clone(),
            chunk_filename: assets.css,
        }],
        externals: ExternalsPolicy::Bundle,
        optimization: Optimization::default(),
    })
}

/// Client strategy: page-wrapping rule, manifest plugin, hot reload in
/// development, and the production splitting/minification pass.
fn client_config(options: &BuildOptions) -> Result<TargetConfig> {
    let env = options.env_flags(Target::Client);
    let mut config = base_config(options, Target::Client)?;

    config.rules.push(page_wrap_rule(options, &env));

    config.plugins.push(PluginSpec::Manifest {
        path: options.dirs.build_dir().join(&options.build.manifest),
        public_path: options.build.public_path.clone(),
    });
    if let Mode::Development = options.mode {
        config.plugins.push(PluginSpec::HotModuleReplacement);
    }

    config.optimization = match options.mode {
        Mode::Development => Optimization::default(),
        Mode::Production => Optimization {
            split_chunks: vec![
                CacheGroup {
                    name: "vendor".to_string(),
                    scope: ChunkScope::Initial,
                    test: Some(ModuleTest::ScriptUnder(options.dirs.node_modules())),
                    min_chunks: 1,
                    priority: -10,
                },
                CacheGroup {
                    name: "async".to_string(),
                    scope: ChunkScope::Async,
                    test: None,
                    min_chunks: 3,
                    priority: 0,
                },
            ],
            runtime_chunk: true,
            minify: Some(MinifyOptions {
                drop_comments: true,
                drop_debugger: true,
                drop_console: true,
                css_safe: true,
            }),
        },
    };

    Ok(apply_extend(options, config, &env))
}

/// Server strategy: externalized dependencies, fixed filenames, CommonJS
/// output for a server execution environment.
fn server_config(options: &BuildOptions) -> Result<TargetConfig> {
    let env = options.env_flags(Target::Server);
    let mut config = base_config(options, Target::Server)?;

    config.output.filename = "[name].js".to_string();
    config.output.chunk_filename = "[name].js".to_string();
    config.output.library = LibraryTarget::CommonJs;
    config.externals = ExternalsPolicy::NodeModules;

    Ok(apply_extend(options, config, &env))
}

fn apply_extend(options: &BuildOptions, config: TargetConfig, env: &EnvFlags) -> TargetConfig {
    match &options.build.extend {
        Some(hook) => hook(config, env),
        None => config,
    }
}

/// Environment constant table: mode, dev flag, user variables, and the
/// per-target platform flags.
fn defines(options: &BuildOptions, env: &EnvFlags) -> BTreeMap<String, String> {
    let mut table = BTreeMap::new();
    let mode = serde_json::Value::from(options.mode.as_str());
    table.insert("process.env.NODE_ENV".to_string(), render(&mode));
    table.insert("process.mode".to_string(), render(&mode));
    table.insert("process.dev".to_string(), env.dev.to_string());

    const ENV_PREFIX: &str = "process.env.";
    for (key, value) in &options.env {
        let key = format!("{ENV_PREFIX}{}", key.strip_prefix(ENV_PREFIX).unwrap_or(key));
        table.insert(key, render(value));
    }

    table.insert("process.browser".to_string(), env.client.to_string());
    table.insert("process.client".to_string(), env.client.to_string());
    table.insert("process.server".to_string(), env.server.to_string());
    table
}

/// Render a constant value as code text. JSON rendering keeps booleans and
/// numbers as bare tokens and quotes everything else.
fn render(value: &serde_json::Value) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn options(mode: Mode) -> BuildOptions {
        BuildOptions::new("/proj").mode(mode)
    }

    #[test]
    fn configs_are_idempotent() {
        let options = options(Mode::Production)
            .env_var("API_URL", serde_json::json!("https://example.test"))
            .alias("@", "/proj/src");

        let first = build_configs(&options).unwrap();
        let second = build_configs(&options).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn source_maps_dev_client_only() {
        let dev = build_configs(&options(Mode::Development)).unwrap();
        assert!(dev.client.source_maps);
        assert!(!dev.server.source_maps);

        let prod = build_configs(&options(Mode::Production)).unwrap();
        assert!(!prod.client.source_maps);
        assert!(!prod.server.source_maps);
    }

    #[test]
    fn server_externalizes_and_fixes_filenames() {
        let configs = build_configs(&options(Mode::Production)).unwrap();
        let server = &configs.server;

        assert_eq!(server.externals, ExternalsPolicy::NodeModules);
        assert_eq!(server.output.filename, "[name].js");
        assert_eq!(server.output.library, LibraryTarget::CommonJs);
        assert_eq!(server.platform, Platform::Node);

        let client = &configs.client;
        assert_eq!(client.externals, ExternalsPolicy::Bundle);
        assert_eq!(client.platform, Platform::Browser);
        assert_eq!(client.output.filename, "static/js/[contenthash:8].js");
    }

    #[test]
    fn defines_render_raw_and_serialized() {
        let options = options(Mode::Production)
            .env_var("FLAG", serde_json::json!(true))
            .env_var("LIMIT", serde_json::json!(42))
            .env_var("NAME", serde_json::json!("twofold"))
            .env_var("process.env.PREFIXED", serde_json::json!(1));

        let configs = build_configs(&options).unwrap();
        let defines = &configs.client.defines;

        assert_eq!(defines["process.env.NODE_ENV"], "\"production\"");
        assert_eq!(defines["process.dev"], "false");
        assert_eq!(defines["process.env.FLAG"], "true");
        assert_eq!(defines["process.env.LIMIT"], "42");
        assert_eq!(defines["process.env.NAME"], "\"twofold\"");
        // A pre-prefixed key is not double-prefixed.
        assert_eq!(defines["process.env.PREFIXED"], "1");

        assert_eq!(defines["process.browser"], "true");
        let server = &configs.server.defines;
        assert_eq!(server["process.browser"], "false");
        assert_eq!(server["process.server"], "true");
    }

    #[test]
    fn vendor_group_applies_in_production_only() {
        let prod = build_configs(&options(Mode::Production)).unwrap();
        let vendored = prod.client.optimization.group_for(
            Path::new("/proj/node_modules/react/index.js"),
            ChunkScope::Initial,
            1,
        );
        assert_eq!(vendored, Some("vendor"));

        // Application modules stay in the entry chunk.
        let own = prod.client.optimization.group_for(
            Path::new("/proj/src/pages/index.js"),
            ChunkScope::Initial,
            1,
        );
        assert_eq!(own, None);

        let dev = build_configs(&options(Mode::Development)).unwrap();
        let vendored = dev.client.optimization.group_for(
            Path::new("/proj/node_modules/react/index.js"),
            ChunkScope::Initial,
            1,
        );
        assert_eq!(vendored, None);
    }

    #[test]
    fn async_group_needs_three_chunks() {
        let prod = build_configs(&options(Mode::Production)).unwrap();
        let optimization = &prod.client.optimization;
        let module = Path::new("/proj/src/widgets/chart.js");

        assert_eq!(optimization.group_for(module, ChunkScope::Async, 3), Some("async"));
        assert_eq!(optimization.group_for(module, ChunkScope::Async, 2), None);
    }

    #[test]
    fn minifier_strips_everything_in_production() {
        let prod = build_configs(&options(Mode::Production)).unwrap();
        let minify = prod.client.optimization.minify.as_ref().unwrap();
        assert!(minify.drop_comments && minify.drop_debugger && minify.drop_console);
        assert!(minify.css_safe);
        assert!(prod.client.optimization.runtime_chunk);

        assert!(prod.server.optimization.minify.is_none());
        let dev = build_configs(&options(Mode::Development)).unwrap();
        assert!(dev.client.optimization.minify.is_none());
    }

    #[test]
    fn dev_alias_rewrites_react_dom() {
        let dev = build_configs(&options(Mode::Development)).unwrap();
        assert_eq!(
            dev.client.resolve.alias.get("react-dom").map(String::as_str),
            Some("@hot-loader/react-dom")
        );

        let prod = build_configs(&options(Mode::Production)).unwrap();
        assert!(!prod.client.resolve.alias.contains_key("react-dom"));
    }

    #[test]
    fn extend_hook_runs_last() {
        let options = options(Mode::Production).extend(Arc::new(|mut config, env| {
            if env.client {
                config.output.public_path = "/cdn/".to_string();
            }
            config
        }));

        let configs = build_configs(&options).unwrap();
        assert_eq!(configs.client.output.public_path, "/cdn/");
        assert_eq!(configs.server.output.public_path, "/");
    }

    #[test]
    fn client_plugins_include_manifest_and_dev_hot() {
        let dev = build_configs(&options(Mode::Development)).unwrap();
        assert!(dev
            .client
            .plugins
            .iter()
            .any(|p| matches!(p, PluginSpec::HotModuleReplacement)));
        assert!(dev
            .client
            .plugins
            .iter()
            .any(|p| matches!(p, PluginSpec::Manifest { .. })));

        let prod = build_configs(&options(Mode::Production)).unwrap();
        assert!(!prod
            .client
            .plugins
            .iter()
            .any(|p| matches!(p, PluginSpec::HotModuleReplacement)));
        assert!(!prod
            .server
            .plugins
            .iter()
            .any(|p| matches!(p, PluginSpec::Manifest { .. })));
    }
}

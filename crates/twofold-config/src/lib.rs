//! Build-configuration synthesis for the two compile targets.
//!
//! One normalized [`BuildOptions`] value produces two frozen
//! [`TargetConfig`]s, one for the browser bundle and one for the server
//! bundle. Everything here is pure configuration: no compiler is invoked and
//! no file is written.

mod assets;
mod entries;
mod error;
mod mode;
mod options;
mod rules;
mod target;

pub use assets::AssetPaths;
pub use entries::{
    client_entries, server_entries, EntryMap, CONNECTIVITY_POLYFILL, DEFAULT_PAGES, HMR_PATH,
    HOT_CLIENT, PAGE_MARKER,
};
pub use error::{ConfigError, Result};
pub use mode::{EnvFlags, Mode, Platform, Target};
pub use options::{
    find_page_file, BuildOptions, BuildSettings, DirLayout, ExtendHook, FilenameTemplates,
    Globals, ListHook, ListOverride, Template, TemplateFn, TransformSettings, WatchSettings,
};
pub use rules::{
    base_rules, page_wrap_rule, transform_options, AssetClass, Rule, StyleDialect, StylePass,
    StyleRule, TransformOptions, INLINE_LIMIT, STYLE_MODULES_MARKER,
};
pub use target::{
    build_configs, CacheGroup, ChunkScope, ExternalsPolicy, LibraryTarget, MinifyOptions,
    ModuleTest, Optimization, OutputSpec, PluginSpec, ResolveSpec, TargetConfig, TargetConfigs,
};

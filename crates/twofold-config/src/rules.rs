//! Ordered source-transform rule table.
//!
//! The shared base covers scripts (with optional lint ahead of it), every
//! style dialect in scoped and plain variants, and static assets with an
//! inline-size threshold. The client target layers one extra rule on top:
//! marker-carrying page requests are routed through the page-wrapping
//! transform.

use std::path::PathBuf;

use crate::assets::AssetPaths;
use crate::entries::{page_module, DEFAULT_PAGES, HOT_CLIENT, PAGE_MARKER};
use crate::mode::EnvFlags;
use crate::options::{BuildOptions, ListOverride};

/// Assets at or below this size are inlined as data references instead of
/// emitted as files.
pub const INLINE_LIMIT: u64 = 1000;

/// Request marker selecting the scoped-class-name style branch.
pub const STYLE_MODULES_MARKER: &str = "modules";

/// Static asset class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetClass {
    Image,
    Video,
    Font,
}

impl AssetClass {
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            AssetClass::Image => &["png", "jpg", "jpeg", "gif", "svg", "webp", "avif"],
            AssetClass::Video => &["webm", "mp4", "ogv"],
            AssetClass::Font => &["woff", "woff2", "eot", "ttf", "otf"],
        }
    }
}

/// Alternate style syntax chained after the shared base passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleDialect {
    Less,
    Sass,
    Stylus,
}

/// One pass in a style chain, applied in order.
#[derive(Debug, Clone, PartialEq)]
pub enum StylePass {
    /// Extract the final stylesheet out of the bundle.
    Extract,
    /// Base stylesheet pass; `scoped` selects local class-name generation
    /// using `scoped_name` as the template.
    Css {
        scoped: bool,
        scoped_name: String,
        source_maps: bool,
    },
    /// Post-processing pass shared by every dialect.
    PostCss { source_maps: bool },
    /// Dialect-specific preprocessor, chained last.
    Preprocessor {
        dialect: StyleDialect,
        indented: bool,
        source_maps: bool,
    },
}

/// Style rule for one file extension, branching on the request marker.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub extension: &'static str,
    /// Chain used when the request carries [`STYLE_MODULES_MARKER`].
    pub scoped: Vec<StylePass>,
    /// Chain used otherwise.
    pub plain: Vec<StylePass>,
    pub marker: &'static str,
}

/// Resolved script-transform options.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOptions {
    /// Target name the transform runs under ("client" or "server").
    pub env_name: String,
    /// Explicit external configuration, used verbatim when present.
    pub config_file: Option<PathBuf>,
    pub plugins: Vec<String>,
    pub presets: Vec<String>,
}

/// One entry in the ordered rule table.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Pre-pass lint over the source tree, inserted immediately before the
    /// script rule when enabled.
    Lint { include: PathBuf },
    /// Script transform scoped to the source tree and the hot client runtime.
    Script {
        include: Vec<PathBuf>,
        options: TransformOptions,
    },
    Style(StyleRule),
    /// Static asset rule; emission is client-only so files are not written
    /// twice.
    Asset {
        class: AssetClass,
        inline_limit: u64,
        emit: bool,
        filename: String,
    },
    /// Client-only: marker-carrying page requests get wrapped with the
    /// shell/app/error modules.
    PageWrap {
        marker: &'static str,
        document: String,
        app: String,
        error: String,
        use_hot: bool,
        id: String,
        context: String,
    },
}

/// Shared base rule table, in fixed order: optional lint, script, styles,
/// assets.
pub fn base_rules(options: &BuildOptions, env: &EnvFlags, assets: &AssetPaths) -> Vec<Rule> {
    let mut rules = Vec::new();

    if options.build.lint {
        rules.push(Rule::Lint {
            include: options.dirs.source_dir(),
        });
    }

    rules.push(Rule::Script {
        include: vec![
            options.dirs.source_dir(),
            options.dirs.node_modules().join(HOT_CLIENT),
        ],
        options: transform_options(options, env),
    });

    rules.extend(style_rules(env.dev, assets).into_iter().map(Rule::Style));
    rules.extend(asset_rules(env.client, assets));
    rules
}

/// The client-only page-wrapping rule layered atop the script rule.
pub fn page_wrap_rule(options: &BuildOptions, env: &EnvFlags) -> Rule {
    let page_dir = options.dirs.page_dir();
    Rule::PageWrap {
        marker: PAGE_MARKER,
        document: page_module(&page_dir, "_document", DEFAULT_PAGES.document),
        app: page_module(&page_dir, "_app", DEFAULT_PAGES.app),
        error: page_module(&page_dir, "_error", DEFAULT_PAGES.error),
        use_hot: env.dev,
        id: options.globals.id.clone(),
        context: options.globals.context.clone(),
    }
}

/// Resolve the script-transform options. An explicit external configuration
/// is used verbatim; otherwise defaults are computed, and a user hook may
/// replace either list wholesale.
pub fn transform_options(options: &BuildOptions, env: &EnvFlags) -> TransformOptions {
    let env_name = if env.server { "server" } else { "client" }.to_string();
    let transform = &options.build.transform;

    if let Some(config_file) = &transform.config_file {
        return TransformOptions {
            env_name,
            config_file: Some(config_file.clone()),
            plugins: Vec::new(),
            presets: Vec::new(),
        };
    }

    let default_plugins = vec![
        "@babel/plugin-transform-runtime".to_string(),
        "@babel/plugin-syntax-dynamic-import".to_string(),
        "@babel/plugin-proposal-class-properties".to_string(),
        "@twofold/plugin-auto-style-modules".to_string(),
    ];
    let default_presets = vec![
        "@babel/preset-env".to_string(),
        "@babel/preset-react".to_string(),
    ];

    TransformOptions {
        env_name,
        config_file: None,
        plugins: apply_override(&transform.plugins, env, default_plugins),
        presets: apply_override(&transform.presets, env, default_presets),
    }
}

fn apply_override(choice: &ListOverride, env: &EnvFlags, defaults: Vec<String>) -> Vec<String> {
    match choice {
        ListOverride::Default => defaults,
        ListOverride::List(list) => list.clone(),
        ListOverride::Hook(hook) => hook(env, &defaults),
    }
}

/// One branching rule per style extension. Each dialect chains its
/// preprocessor after the shared extract/base/post-process passes.
fn style_rules(source_maps: bool, assets: &AssetPaths) -> Vec<StyleRule> {
    const DIALECTS: &[(&str, Option<StyleDialect>, bool)] = &[
        ("css", None, false),
        ("postcss", None, false),
        ("less", Some(StyleDialect::Less), false),
        // `.sass` is the indented syntax; `.scss` is not.
        ("sass", Some(StyleDialect::Sass), true),
        ("scss", Some(StyleDialect::Sass), false),
        ("stylus", Some(StyleDialect::Stylus), false),
        ("styl", Some(StyleDialect::Stylus), false),
    ];

    DIALECTS
        .iter()
        .map(|&(extension, dialect, indented)| {
            let chain = |scoped: bool| {
                let mut passes = vec![
                    StylePass::Extract,
                    StylePass::Css {
                        scoped,
                        scoped_name: assets.css_modules_name.clone(),
                        source_maps,
                    },
                    StylePass::PostCss { source_maps },
                ];
                if let Some(dialect) = dialect {
                    passes.push(StylePass::Preprocessor {
                        dialect,
                        indented,
                        source_maps,
                    });
                }
                passes
            };

            StyleRule {
                extension,
                scoped: chain(true),
                plain: chain(false),
                marker: STYLE_MODULES_MARKER,
            }
        })
        .collect()
}

fn asset_rules(emit: bool, assets: &AssetPaths) -> Vec<Rule> {
    [
        (AssetClass::Image, assets.img.clone()),
        (AssetClass::Video, assets.video.clone()),
        (AssetClass::Font, assets.font.clone()),
    ]
    .into_iter()
    .map(|(class, filename)| Rule::Asset {
        class,
        inline_limit: INLINE_LIMIT,
        emit,
        filename,
    })
    .collect()
}

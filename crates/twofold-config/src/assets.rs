//! Output-path templates per asset class.
//!
//! Resolution order per class: explicit string template, explicit function
//! template (invoked with the environment flags), then the mode-dependent
//! built-in default. Development defaults avoid content-hash placeholders so
//! the in-memory artifact store stays bounded; production defaults use them
//! for cache busting.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::mode::{EnvFlags, Mode};
use crate::options::{BuildOptions, Template};

static HASH_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(chunkhash|contenthash|hash)(?::\d+)?\]").expect("static pattern"));

/// Resolved output-path template per asset class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    /// Entry script bundle.
    pub app: String,
    /// Non-entry chunk.
    pub chunk: String,
    /// Extracted stylesheet.
    pub css: String,
    pub img: String,
    pub font: String,
    pub video: String,
    /// Scoped-style class-name template (never path-joined).
    pub css_modules_name: String,
}

impl AssetPaths {
    pub fn resolve(options: &BuildOptions, env: &EnvFlags) -> Self {
        let templates = &options.build.filenames;
        let statics = options.dirs.statics.as_str();
        let mode = options.mode;

        let place = |template: &Option<Template>, dev_default: &str, prod_default: &str| {
            file_name(template, env, mode, statics, dev_default, prod_default)
        };

        Self {
            app: place(&templates.app, "[name].js", "js/[contenthash:8].js"),
            chunk: place(&templates.chunk, "[name].js", "js/[contenthash:8].js"),
            css: place(&templates.css, "[name].css", "css/[contenthash:8].css"),
            img: place(
                &templates.img,
                "[path][name].[ext]",
                "images/[contenthash:8].[ext]",
            ),
            font: place(
                &templates.font,
                "[path][name].[ext]",
                "fonts/[contenthash:8].[ext]",
            ),
            video: place(
                &templates.video,
                "[path][name].[ext]",
                "videos/[contenthash:8].[ext]",
            ),
            css_modules_name: match &templates.css_modules_name {
                Some(template) => template.resolve(env),
                None => match mode {
                    Mode::Development => "[name]__[local]--[hash:base64:5]".to_string(),
                    Mode::Production => "_[hash:base64:10]".to_string(),
                },
            },
        }
    }
}

/// Resolve one filename template. User templates are joined under the static
/// directory in production and left in place in development; a development
/// template carrying a hash placeholder is warned about but used unchanged.
fn file_name(
    template: &Option<Template>,
    env: &EnvFlags,
    mode: Mode,
    statics: &str,
    dev_default: &str,
    prod_default: &str,
) -> String {
    let joined = |path: &str| match mode {
        Mode::Development => path.to_string(),
        Mode::Production => format!("{statics}/{path}"),
    };

    match template {
        Some(template) => {
            let resolved = joined(&template.resolve(env));
            if mode.is_dev() {
                if let Some(found) = HASH_PLACEHOLDER.captures(&resolved) {
                    tracing::warn!(
                        placeholder = &found[1],
                        template = %resolved,
                        "avoid hash placeholders in development filenames; \
                         the in-memory artifact store never evicts"
                    );
                }
            }
            resolved
        }
        None => match mode {
            Mode::Development => dev_default.to_string(),
            Mode::Production => joined(prod_default),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Target;

    fn resolve(options: &BuildOptions) -> AssetPaths {
        let env = options.env_flags(Target::Client);
        AssetPaths::resolve(options, &env)
    }

    #[test]
    fn development_defaults_are_unhashed() {
        let options = BuildOptions::new("/proj").mode(Mode::Development);
        let paths = resolve(&options);

        assert_eq!(paths.app, "[name].js");
        assert_eq!(paths.css, "[name].css");
        assert_eq!(paths.img, "[path][name].[ext]");
        assert!(!HASH_PLACEHOLDER.is_match(&paths.app));
    }

    #[test]
    fn production_defaults_are_hashed_under_statics() {
        let options = BuildOptions::new("/proj").mode(Mode::Production);
        let paths = resolve(&options);

        assert_eq!(paths.app, "static/js/[contenthash:8].js");
        assert_eq!(paths.font, "static/fonts/[contenthash:8].[ext]");
        assert_eq!(paths.css_modules_name, "_[hash:base64:10]");
    }

    #[test]
    fn user_template_wins_over_default() {
        let mut options = BuildOptions::new("/proj").mode(Mode::Production);
        options.build.filenames.app = Some("bundles/[contenthash].js".into());
        let paths = resolve(&options);

        assert_eq!(paths.app, "static/bundles/[contenthash].js");
    }

    #[test]
    fn dev_hash_template_is_warned_but_unchanged() {
        let mut options = BuildOptions::new("/proj").mode(Mode::Development);
        options.build.filenames.app = Some("js/[contenthash:8].js".into());
        let paths = resolve(&options);

        // Warn-only contract: the unsafe template passes through untouched.
        assert_eq!(paths.app, "js/[contenthash:8].js");
    }

    #[test]
    fn function_template_receives_env_flags() {
        use std::sync::Arc;

        let mut options = BuildOptions::new("/proj").mode(Mode::Development);
        options.build.filenames.css = Some(Template::Fn(Arc::new(|env| {
            if env.dev {
                "dev/[name].css".to_string()
            } else {
                "css/[contenthash:8].css".to_string()
            }
        })));
        let paths = resolve(&options);

        assert_eq!(paths.css, "dev/[name].css");
    }
}

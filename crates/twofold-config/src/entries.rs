//! Page discovery and entry-map synthesis.
//!
//! Scans the page directory for files matching the page glob and produces one
//! named entry per page. Missing framework pages are filled from the built-in
//! defaults: the server map always carries `_document`, `_app` and `_error`,
//! the client map always carries `_error`. An empty match set is not an
//! error; the maps degrade to the injected defaults.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use regex::Regex;
use walkdir::WalkDir;

use crate::error::{ConfigError, Result};
use crate::options::{find_page_file, BuildOptions};

/// Ordered mapping from entry name to the module requests rooting its bundle.
pub type EntryMap = IndexMap<String, Vec<String>>;

/// Request marker routing client page entries through the page-wrapping
/// transform.
pub const PAGE_MARKER: &str = "twofoldPage";

/// Hot-reload client runtime, prepended to every dev client entry.
pub const HOT_CLIENT: &str = "@twofold/hot-client";

/// Connectivity polyfill, prepended ahead of the hot client runtime.
pub const CONNECTIVITY_POLYFILL: &str = "eventsource-polyfill";

/// Hot-update endpoint, relative to the public base path.
pub const HMR_PATH: &str = "__twofold__/hmr";

/// Built-in default page modules, used when the project has no file of the
/// same name.
pub struct DefaultPages {
    pub document: &'static str,
    pub app: &'static str,
    pub error: &'static str,
}

pub const DEFAULT_PAGES: DefaultPages = DefaultPages {
    document: "@twofold/pages/document",
    app: "@twofold/pages/app",
    error: "@twofold/pages/error",
};

const PAGE_EXTENSIONS: &[&str] = &["js", "jsx"];

/// Client entry map: discovered pages plus `_error`, each rewritten to a
/// single marker-suffixed request. In development two bootstrap modules are
/// prepended in fixed order: the connectivity polyfill, then the hot client
/// runtime pointed at the hot-update path.
pub fn client_entries(options: &BuildOptions) -> Result<EntryMap> {
    let mut pages = discover_pages(&options.dirs.page_dir(), &options.pattern)?;
    inject_default(&mut pages, &options.dirs.page_dir(), "_error", DEFAULT_PAGES.error);

    let hot_client = format!(
        "{HOT_CLIENT}?path={}{HMR_PATH}",
        options.build.public_path
    );

    let mut entries = EntryMap::new();
    for (name, module) in pages {
        let page = format!("{module}?{PAGE_MARKER}");
        let value = if options.mode.is_dev() {
            vec![
                CONNECTIVITY_POLYFILL.to_string(),
                hot_client.clone(),
                page,
            ]
        } else {
            vec![page]
        };
        entries.insert(name, value);
    }
    Ok(entries)
}

/// Server entry map: discovered pages plus `_document`, `_app` and `_error`,
/// each keyed under the server output subdirectory.
pub fn server_entries(options: &BuildOptions) -> Result<EntryMap> {
    let page_dir = options.dirs.page_dir();
    let mut pages = discover_pages(&page_dir, &options.pattern)?;
    inject_default(&mut pages, &page_dir, "_document", DEFAULT_PAGES.document);
    inject_default(&mut pages, &page_dir, "_app", DEFAULT_PAGES.app);
    inject_default(&mut pages, &page_dir, "_error", DEFAULT_PAGES.error);

    let mut entries = EntryMap::new();
    for (name, module) in pages {
        let key: String = format!("{}/{}", options.build.server_dir, name)
            .split('/')
            .filter(|seg| !seg.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        entries.insert(key, vec![module]);
    }
    Ok(entries)
}

/// Walk the page directory and collect name -> source-module pairs for files
/// matching the glob. Names are the path relative to the page directory,
/// minus extension, sorted for determinism. A missing directory yields an
/// empty map.
fn discover_pages(page_dir: &Path, pattern: &str) -> Result<IndexMap<String, String>> {
    let matcher = glob_to_regex(pattern)?;
    let mut found: Vec<(String, String)> = Vec::new();

    if page_dir.is_dir() {
        for entry in WalkDir::new(page_dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(page_dir) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            let rel_str = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !matcher.is_match(&rel_str) {
                continue;
            }
            let name = match rel_str.rsplit_once('.') {
                Some((stem, _ext)) => stem.to_string(),
                None => rel_str.clone(),
            };
            found.push((name, entry.path().display().to_string()));
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found.into_iter().collect())
}

/// Fill a framework page from the project file when present, otherwise from
/// the built-in default module.
fn inject_default(
    pages: &mut IndexMap<String, String>,
    page_dir: &Path,
    name: &str,
    default_module: &str,
) {
    if pages.contains_key(name) {
        return;
    }
    let module = match find_page_file(page_dir, name, PAGE_EXTENSIONS) {
        Some(path) => path.display().to_string(),
        None => default_module.to_string(),
    };
    pages.insert(name.to_string(), module);
}

/// Resolve a framework page module for the page-wrapping transform.
pub fn page_module(page_dir: &Path, name: &str, default_module: &str) -> String {
    find_page_file(page_dir, name, PAGE_EXTENSIONS)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| default_module.to_string())
}

/// Compile a page glob into a regex. Supports `*` (within a segment), `**`
/// (across segments), `?`, and one level of `{a,b}` alternation.
fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    let mut group_depth = 0u32;

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        // Zero or more whole segments.
                        out.push_str("(?:.*/)?");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '{' => {
                group_depth += 1;
                out.push_str("(?:");
            }
            ',' if group_depth > 0 => out.push('|'),
            '}' => {
                if group_depth == 0 {
                    return Err(ConfigError::InvalidPattern {
                        pattern: pattern.to_string(),
                        reason: "unbalanced `}`".to_string(),
                    });
                }
                group_depth -= 1;
                out.push(')');
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    if group_depth != 0 {
        return Err(ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "unbalanced `{`".to_string(),
        });
    }

    out.push('$');
    Regex::new(&out).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use std::fs;

    fn project(mode: Mode) -> (tempfile::TempDir, BuildOptions) {
        let dir = tempfile::tempdir().unwrap();
        let pages = dir.path().join("src/pages");
        fs::create_dir_all(&pages).unwrap();
        fs::write(pages.join("index.js"), "export default () => null").unwrap();
        fs::write(pages.join("about.jsx"), "export default () => null").unwrap();
        let options = BuildOptions::new(dir.path()).mode(mode);
        (dir, options)
    }

    #[test]
    fn glob_matches_extension_alternation() {
        let re = glob_to_regex("**/*.{js,jsx}").unwrap();
        assert!(re.is_match("index.js"));
        assert!(re.is_match("about.jsx"));
        assert!(re.is_match("blog/post.js"));
        assert!(!re.is_match("style.css"));
        assert!(!re.is_match("index.js.bak"));
    }

    #[test]
    fn glob_single_star_stays_in_segment() {
        let re = glob_to_regex("*.js").unwrap();
        assert!(re.is_match("index.js"));
        assert!(!re.is_match("blog/post.js"));
    }

    #[test]
    fn glob_rejects_unbalanced_braces() {
        assert!(glob_to_regex("*.{js,jsx").is_err());
        assert!(glob_to_regex("*.js}").is_err());
    }

    #[test]
    fn client_map_injects_error_default() {
        let (_dir, options) = project(Mode::Production);
        let entries = client_entries(&options).unwrap();

        // Discovered pages in sorted order, injected defaults appended.
        let keys: Vec<_> = entries.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["about", "index", "_error"]);
        assert_eq!(
            entries["_error"],
            vec![format!("{}?{PAGE_MARKER}", DEFAULT_PAGES.error)]
        );
        assert!(entries["index"][0].ends_with(&format!("index.js?{PAGE_MARKER}")));
    }

    #[test]
    fn dev_client_entries_prepend_bootstrap_modules() {
        let (_dir, options) = project(Mode::Development);
        let entries = client_entries(&options).unwrap();

        let index = &entries["index"];
        assert_eq!(index.len(), 3);
        assert_eq!(index[0], CONNECTIVITY_POLYFILL);
        assert_eq!(index[1], format!("{HOT_CLIENT}?path=/{HMR_PATH}"));
        assert!(index[2].ends_with(&format!("?{PAGE_MARKER}")));
    }

    #[test]
    fn server_map_injects_framework_defaults() {
        let (_dir, options) = project(Mode::Production);
        let entries = server_entries(&options).unwrap();

        for key in ["server/_document", "server/_app", "server/_error"] {
            assert!(entries.contains_key(key), "missing {key}");
        }
        assert!(entries.contains_key("server/index"));
        assert!(entries.contains_key("server/about"));
        assert_eq!(entries["server/_app"], vec![DEFAULT_PAGES.app.to_string()]);
    }

    #[test]
    fn project_framework_file_wins_over_default() {
        let (dir, options) = project(Mode::Production);
        fs::write(
            dir.path().join("src/pages/_app.jsx"),
            "export default () => null",
        )
        .unwrap();

        let entries = server_entries(&options).unwrap();
        assert!(entries["server/_app"][0].ends_with("_app.jsx"));
    }

    #[test]
    fn missing_page_dir_degrades_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let options = BuildOptions::new(dir.path());

        let client = client_entries(&options).unwrap();
        assert_eq!(client.len(), 1);
        assert!(client.contains_key("_error"));

        let server = server_entries(&options).unwrap();
        assert_eq!(server.len(), 3);
    }
}

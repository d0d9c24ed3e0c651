//! File system watcher with debouncing for watch mode.
//!
//! Watches the source tree recursively and filters changes against the
//! configured ignore patterns before handing them to a rebuild loop.
//! Debouncing collapses rapid successive events on the same file.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use twofold_config::WatchSettings;

use crate::error::{BuildError, Result};

/// File change event type.
#[derive(Debug, Clone)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Recursive watcher over one directory.
///
/// Change events arrive through the returned channel. Dropping the watcher
/// stops the stream.
#[derive(Debug)]
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    pub fn new(
        root: PathBuf,
        settings: &WatchSettings,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        if !root.exists() {
            return Err(BuildError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("watch root does not exist: {}", root.display()),
            )));
        }

        let (tx, rx) = mpsc::channel(100);

        let debounce = Duration::from_millis(settings.debounce_ms);
        let mut last_event: Option<(PathBuf, Instant)> = None;
        let ignored = settings.ignored.clone();
        let watch_root = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                for path in &event.paths {
                    if Self::should_ignore(path, &watch_root, &ignored) {
                        continue;
                    }

                    let now = Instant::now();
                    if let Some((last_path, last_time)) = &last_event {
                        if last_path == path && now.duration_since(*last_time) < debounce {
                            continue;
                        }
                    }
                    last_event = Some((path.clone(), now));

                    let change = match event.kind {
                        notify::EventKind::Create(_) => FileChange::Created(path.clone()),
                        notify::EventKind::Modify(_) => FileChange::Modified(path.clone()),
                        notify::EventKind::Remove(_) => FileChange::Removed(path.clone()),
                        _ => continue,
                    };

                    let _ = tx.blocking_send(change);
                }
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    /// Paths outside the root, matching an ignore pattern, or inside a hidden
    /// directory are dropped.
    fn should_ignore(path: &Path, root: &Path, ignored: &[String]) -> bool {
        if !path.starts_with(root) {
            return true;
        }

        let rel = match path.strip_prefix(root) {
            Ok(p) => p,
            Err(_) => return true,
        };
        let rel_str = rel.to_string_lossy();

        for pattern in ignored {
            if let Some(ext) = pattern.strip_prefix('*') {
                if rel_str.ends_with(ext) {
                    return true;
                }
            } else if rel_str.starts_with(pattern.as_str())
                || rel_str.contains(&format!("/{pattern}"))
            {
                return true;
            }
        }

        for component in rel.components() {
            if let Some(name) = component.as_os_str().to_str() {
                if name.starts_with('.') && name != "." && name != ".." {
                    return true;
                }
            }
        }

        false
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_node_modules() {
        let root = PathBuf::from("/project");
        let patterns = vec!["node_modules".to_string()];

        let path = PathBuf::from("/project/node_modules/react/index.js");
        assert!(FileWatcher::should_ignore(&path, &root, &patterns));

        let path = PathBuf::from("/project/src/pages/index.js");
        assert!(!FileWatcher::should_ignore(&path, &root, &patterns));
    }

    #[test]
    fn ignores_extension_patterns() {
        let root = PathBuf::from("/project");
        let patterns = vec!["*.log".to_string()];

        assert!(FileWatcher::should_ignore(
            &PathBuf::from("/project/debug.log"),
            &root,
            &patterns
        ));
        assert!(!FileWatcher::should_ignore(
            &PathBuf::from("/project/src/index.js"),
            &root,
            &patterns
        ));
    }

    #[test]
    fn ignores_hidden_and_outside_paths() {
        let root = PathBuf::from("/project");
        let patterns = vec![];

        assert!(FileWatcher::should_ignore(
            &PathBuf::from("/project/.git/config"),
            &root,
            &patterns
        ));
        assert!(FileWatcher::should_ignore(
            &PathBuf::from("/elsewhere/file.js"),
            &root,
            &patterns
        ));
    }

    #[tokio::test]
    async fn delivers_change_events() {
        let dir = tempfile::tempdir().unwrap();
        let settings = WatchSettings {
            debounce_ms: 0,
            ignored: vec![],
        };
        let (_watcher, mut rx) = FileWatcher::new(dir.path().to_path_buf(), &settings).unwrap();

        std::fs::write(dir.path().join("page.js"), "export default 1").unwrap();

        let change = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("watcher timed out")
            .expect("channel closed");
        assert!(change.path().ends_with("page.js"));
    }

    #[test]
    fn missing_root_is_rejected() {
        let settings = WatchSettings::default();
        let err = FileWatcher::new(PathBuf::from("/nonexistent-root"), &settings).unwrap_err();
        assert!(matches!(err, BuildError::Io(_)));
    }
}

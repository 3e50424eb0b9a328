// Shader hot reload
//
// Watches the directories holding the program's shader sources and reports
// when one of the watched files changes. The notify callback runs on its own
// thread and only forwards paths; the frame loop drains them with `poll`.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};

pub struct ShaderWatcher {
    files: Vec<PathBuf>,
    changes: Receiver<PathBuf>,
    // Dropping the watcher stops the notifications
    _watcher: RecommendedWatcher,
}

impl ShaderWatcher {
    pub fn new(files: &[&Path]) -> Result<Self> {
        let files: Vec<PathBuf> = files.iter().map(|p| canonical(p)).collect();
        let (tx, changes) = mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        return;
                    }
                    for path in event.paths {
                        let _ = tx.send(path);
                    }
                }
                Err(e) => log::error!("Shader watcher error: {}", e),
            }
        })
        .context("Failed to create shader watcher")?;

        // Editors often replace files on save, so watch the parent directories
        let dirs: BTreeSet<PathBuf> = files
            .iter()
            .filter_map(|f| f.parent().map(Path::to_path_buf))
            .collect();
        for dir in &dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .with_context(|| format!("Failed to watch {:?}", dir))?;
            log::info!("Watching {:?} for shader changes", dir);
        }

        Ok(Self {
            files,
            changes,
            _watcher: watcher,
        })
    }

    /// True if any watched file changed since the last poll
    pub fn poll(&self) -> bool {
        let mut changed = false;
        for path in self.changes.try_iter() {
            if is_watched(&self.files, &path) {
                log::debug!("Shader source changed: {:?}", path);
                changed = true;
            }
        }
        changed
    }
}

fn is_watched(files: &[PathBuf], path: &Path) -> bool {
    let path = canonical(path);
    files.iter().any(|f| *f == path)
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_only_listed_files() {
        let files = vec![PathBuf::from("/nonexistent/shaders/quad.vert")];
        assert!(is_watched(&files, Path::new("/nonexistent/shaders/quad.vert")));
        assert!(!is_watched(&files, Path::new("/nonexistent/shaders/quad.frag")));
        assert!(!is_watched(&files, Path::new("/nonexistent/quad.vert")));
    }

    #[test]
    fn relative_and_absolute_paths_agree() {
        let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
        let absolute = canonical(&manifest.join("shaders").join("quad.vert"));
        let files = vec![absolute];
        assert!(is_watched(&files, &manifest.join("shaders/../shaders/quad.vert")));
    }
}

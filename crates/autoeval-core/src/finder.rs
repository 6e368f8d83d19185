//! Locating result files on the local filesystem.

use crate::command::{CommandRunner, CommandSpec};
use crate::error::CommandError;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Searches a directory tree for files by name.
#[async_trait]
pub trait FileFinder: Send + Sync {
    /// Paths of files named `file_name` under `dir`, as reported by the
    /// search (relative to `dir` or absolute). Empty when nothing matched.
    async fn find(&self, dir: &Path, file_name: &str) -> Result<Vec<PathBuf>, CommandError>;
}

/// [`FileFinder`] that shells out to `find . -name <file_name>`.
pub struct FindCommand {
    runner: Arc<dyn CommandRunner>,
}

impl FindCommand {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl FileFinder for FindCommand {
    async fn find(&self, dir: &Path, file_name: &str) -> Result<Vec<PathBuf>, CommandError> {
        let spec = CommandSpec::new(["find", ".", "-name", file_name]).cwd(dir);
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Ok(Vec::new());
        }
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect())
    }
}

/// Lexically normalise `path`: drop `.` components and fold `..`.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

//! Per-job scratch file bookkeeping.

use std::path::{Path, PathBuf};

use crate::media::{remove_dir_quietly, remove_quietly, temp_output_path};

/// Every scratch path a job created. [`Scratch::cleanup`] removes them all,
/// whatever the job outcome was.
#[derive(Debug, Default)]
pub struct Scratch {
    dir: PathBuf,
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
}

impl Scratch {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
            dirs: Vec::new(),
        }
    }

    /// Fresh unique path, tracked for cleanup
    pub fn path(&mut self, prefix: &str, extension: &str) -> PathBuf {
        let path = temp_output_path(&self.dir, prefix, extension);
        self.files.push(path.clone());
        path
    }

    /// Tracks a path created elsewhere
    pub fn track(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        if !self.files.contains(&path) {
            self.files.push(path);
        }
    }

    /// Fresh unique directory path, removed recursively on cleanup
    pub fn dir(&mut self, prefix: &str) -> PathBuf {
        let path = temp_output_path(&self.dir, prefix, "");
        self.dirs.push(path.clone());
        path
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Removes every tracked file and directory. Never fails.
    pub async fn cleanup(self) {
        for file in &self.files {
            remove_quietly(file).await;
        }
        for dir in &self.dirs {
            remove_dir_quietly(dir).await;
        }
    }
}

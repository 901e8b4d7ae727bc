//! Explicit run workspace
//!
//! A [`WorkspaceContext`] owns the export directory path and a scoped
//! temporary directory. Every work item gets its own sub-directory so
//! items can run on separate threads; all temporary storage is removed
//! when the owning value is dropped, on success and error paths alike.

use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir};

use crate::errors::PipelineResult;

/// Export area plus scoped scratch space for one run
#[derive(Debug)]
pub struct WorkspaceContext {
    export_dir: PathBuf,
    temp: TempDir,
}

impl WorkspaceContext {
    /// Creates the export directory and a fresh temporary directory
    ///
    /// # Arguments
    /// * `export_dir` - Durable output location
    /// * `temp_root` - Parent for scratch space; system temp when `None`
    pub fn new(export_dir: &Path, temp_root: Option<&Path>) -> PipelineResult<Self> {
        fs::create_dir_all(export_dir)?;
        let builder = {
            let mut b = Builder::new();
            b.prefix("firescar-zonal-");
            b
        };
        let temp = match temp_root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        debug!("Workspace scratch at {}", temp.path().display());
        Ok(WorkspaceContext { export_dir: export_dir.to_path_buf(), temp })
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Path of `name` inside the export directory
    pub fn export_path(&self, name: &str) -> PathBuf {
        self.export_dir.join(name)
    }

    /// Creates (if needed) and returns an export sub-directory
    pub fn export_subdir(&self, name: &str) -> PipelineResult<PathBuf> {
        let dir = self.export_path(name);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp.path()
    }

    /// Isolated scratch directory for one work item
    pub fn item_dir(&self, label: &str) -> PipelineResult<WorkItemDir> {
        let prefix: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .take(48)
            .collect();
        let dir = Builder::new().prefix(&format!("{}-", prefix)).tempdir_in(self.temp.path())?;
        Ok(WorkItemDir { dir })
    }
}

/// Scratch directory of one work item, removed on drop
#[derive(Debug)]
pub struct WorkItemDir {
    dir: TempDir,
}

impl WorkItemDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_space_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let export = root.path().join("export");
        let ws = WorkspaceContext::new(&export, Some(&root.path().join("tmp"))).unwrap();
        assert!(export.is_dir());

        let item = ws.item_dir("l8olre_p101r077_20190612/dbg").unwrap();
        let item_path = item.path().to_path_buf();
        fs::write(item.join("aligned.tif"), b"x").unwrap();
        assert!(item_path.starts_with(ws.temp_dir()));
        assert!(!item_path.file_name().unwrap().to_string_lossy().contains('/'));
        drop(item);
        assert!(!item_path.exists());

        let temp = ws.temp_dir().to_path_buf();
        drop(ws);
        assert!(!temp.exists());
        assert!(export.is_dir());
    }

    #[test]
    fn item_dirs_are_distinct() {
        let root = tempfile::tempdir().unwrap();
        let ws = WorkspaceContext::new(&root.path().join("export"), Some(root.path())).unwrap();
        let a = ws.item_dir("scene").unwrap();
        let b = ws.item_dir("scene").unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(ws.export_subdir("dbg_zonal_stats").unwrap(), root.path().join("export/dbg_zonal_stats"));
    }
}

//! Temporary directories holding fixture files.

use std::fs;
use std::path::{Path, PathBuf};

/// Creates a temporary directory with a specific prefix.
pub fn temp_test_dir_with_prefix(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temporary test directory")
}

/// A temporary directory that fixture files are written into.
///
/// ```ignore
/// let dir = FixtureDir::new();
/// let sim = dir.write("templates/sim.json", fixtures::templates::SIM_JSON);
/// ```
pub struct FixtureDir {
    dir: tempfile::TempDir,
}

impl FixtureDir {
    pub fn new() -> Self {
        Self {
            dir: temp_test_dir_with_prefix("crop_ensemble_"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of `relative` inside the directory.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Root as a string with a trailing slash, for settings that are
    /// concatenated with sub-paths.
    pub fn prefix(&self) -> String {
        format!("{}/", self.dir.path().display())
    }

    /// Write a file, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create fixture directory");
        }
        fs::write(&path, content).expect("Failed to write fixture file");
        path
    }
}

impl Default for FixtureDir {
    fn default() -> Self {
        Self::new()
    }
}

//! Buildpack directory layout.
//!
//! A staging run writes into the application build directory and into this
//! buildpack's slot of the shared dependencies directory.

use std::path::{Path, PathBuf};

use ngstage_common::error::{Result, StageError};

/// Access to the staging directories.
pub trait Stager {
    /// Application directory containing `nginx.conf`.
    fn build_dir(&self) -> &Path;

    /// Shared dependencies directory.
    fn deps_dir(&self) -> &Path;

    /// Index of this buildpack within the dependencies directory.
    fn deps_idx(&self) -> &str;

    /// This buildpack's dependency directory, `<deps>/<idx>`.
    fn dep_dir(&self) -> PathBuf {
        self.deps_dir().join(self.deps_idx())
    }

    /// Exposes `target` as `<dep_dir>/bin/<name>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the link cannot be created.
    fn add_bin_dependency_link(&self, target: &Path, name: &str) -> Result<()>;

    /// Writes `<dep_dir>/profile.d/<name>.sh`.
    ///
    /// # Errors
    ///
    /// Returns an error if the script cannot be written.
    fn write_profile_d(&self, name: &str, contents: &str) -> Result<()>;
}

/// [`Stager`] over real directories.
#[derive(Debug, Clone)]
pub struct BuildpackStager {
    build_dir: PathBuf,
    deps_dir: PathBuf,
    deps_idx: String,
}

impl BuildpackStager {
    /// Creates a stager for one buildpack run.
    #[must_use]
    pub fn new(
        build_dir: impl Into<PathBuf>,
        deps_dir: impl Into<PathBuf>,
        deps_idx: impl Into<String>,
    ) -> Self {
        Self {
            build_dir: build_dir.into(),
            deps_dir: deps_dir.into(),
            deps_idx: deps_idx.into(),
        }
    }
}

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| StageError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

impl Stager for BuildpackStager {
    fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    fn deps_dir(&self) -> &Path {
        &self.deps_dir
    }

    fn deps_idx(&self) -> &str {
        &self.deps_idx
    }

    fn add_bin_dependency_link(&self, target: &Path, name: &str) -> Result<()> {
        let dep_dir = self.dep_dir();
        let bin_dir = dep_dir.join("bin");
        create_dir(&bin_dir)?;
        let link = bin_dir.join(name);

        // Targets inside the dep dir are linked relative to `bin/`.
        let pointee = target
            .strip_prefix(&dep_dir)
            .map_or_else(|_| target.to_path_buf(), |rel| Path::new("..").join(rel));

        if link.symlink_metadata().is_ok() {
            std::fs::remove_file(&link).map_err(|e| StageError::Io {
                path: link.clone(),
                source: e,
            })?;
        }
        tracing::debug!(link = %link.display(), target = %pointee.display(), "linking binary");
        make_link(&pointee, &link)
    }

    fn write_profile_d(&self, name: &str, contents: &str) -> Result<()> {
        let dir = self.dep_dir().join("profile.d");
        create_dir(&dir)?;
        let path = dir.join(format!("{name}.sh"));
        std::fs::write(&path, contents).map_err(|e| StageError::Io {
            path: path.clone(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), "wrote profile script");
        Ok(())
    }
}

#[cfg(unix)]
fn make_link(pointee: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(pointee, link).map_err(|e| StageError::Io {
        path: link.to_path_buf(),
        source: e,
    })
}

#[cfg(not(unix))]
fn make_link(pointee: &Path, link: &Path) -> Result<()> {
    let source = link.parent().map_or_else(|| pointee.to_path_buf(), |p| p.join(pointee));
    std::fs::copy(&source, link).map(|_| ()).map_err(|e| StageError::Io {
        path: link.to_path_buf(),
        source: e,
    })
}

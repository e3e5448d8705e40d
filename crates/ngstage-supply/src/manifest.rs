//! Dependency manifest (`manifest.yml`) at the buildpack root.

use std::path::{Path, PathBuf};

use ngstage_common::constants::MANIFEST_YML;
use ngstage_common::error::{Result, StageError};
use ngstage_version::VersionLineTable;
use serde::{Deserialize, Serialize};

/// Published versions and version lines known to the buildpack.
pub trait Manifest {
    /// Every published version of `name`, in manifest order.
    fn all_dependency_versions(&self, name: &str) -> Vec<String>;

    /// Root directory of the buildpack.
    fn root_dir(&self) -> &Path;

    /// The channel table.
    fn version_lines(&self) -> VersionLineTable;
}

/// One downloadable artifact listed in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDependency {
    /// Dependency name, e.g. `nginx`.
    pub name: String,
    /// Published version.
    pub version: String,
    /// Location of the archive: `file://`, `http(s)://`, or a path.
    pub uri: String,
    /// Expected SHA-256 of the archive, hex encoded. Empty skips the check.
    #[serde(default)]
    pub sha256: String,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    version_lines: VersionLineTable,
    #[serde(default)]
    dependencies: Vec<ManifestDependency>,
}

/// [`Manifest`] backed by `manifest.yml`.
#[derive(Debug, Clone)]
pub struct YamlManifest {
    root_dir: PathBuf,
    version_lines: VersionLineTable,
    dependencies: Vec<ManifestDependency>,
}

impl YamlManifest {
    /// Loads `manifest.yml` from the buildpack root.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        let path = root_dir.join(MANIFEST_YML);
        tracing::debug!(path = %path.display(), "loading manifest");
        let content = std::fs::read_to_string(&path).map_err(|e| StageError::Io {
            path: path.clone(),
            source: e,
        })?;
        let file: ManifestFile = serde_yaml::from_str(&content)?;
        tracing::debug!(
            dependencies = file.dependencies.len(),
            lines = file.version_lines.channels().count(),
            "manifest loaded"
        );
        Ok(Self {
            root_dir,
            version_lines: file.version_lines,
            dependencies: file.dependencies,
        })
    }

    /// Finds the artifact for an exact name and version.
    #[must_use]
    pub fn dependency(&self, name: &str, version: &str) -> Option<&ManifestDependency> {
        self.dependencies
            .iter()
            .find(|d| d.name == name && d.version == version)
    }
}

impl Manifest for YamlManifest {
    fn all_dependency_versions(&self, name: &str) -> Vec<String> {
        self.dependencies
            .iter()
            .filter(|d| d.name == name)
            .map(|d| d.version.clone())
            .collect()
    }

    fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn version_lines(&self) -> VersionLineTable {
        self.version_lines.clone()
    }
}

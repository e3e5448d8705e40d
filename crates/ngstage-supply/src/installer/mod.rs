//! Dependency installation.
//!
//! An [`Installer`] places one resolved dependency into an output
//! directory. [`ArchiveInstaller`] looks the dependency up in the manifest,
//! fetches the archive (through the cache for remote URIs), verifies its
//! checksum, and unpacks it.

pub mod archive;
pub mod hash;
pub mod source;

use std::path::{Path, PathBuf};

use ngstage_common::error::{Result, StageError};
use ngstage_common::types::Dependency;

use crate::manifest::{Manifest, ManifestDependency, YamlManifest};

use self::source::{ArtifactSource, download, resolve_source};

/// Installs a resolved dependency.
pub trait Installer {
    /// Installs `dependency` into `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be found, fetched, verified,
    /// or unpacked.
    fn install_dependency(&self, dependency: &Dependency, output_dir: &Path) -> Result<()>;
}

/// [`Installer`] for tar archives listed in `manifest.yml`.
#[derive(Debug, Clone)]
pub struct ArchiveInstaller {
    manifest: YamlManifest,
    cache_dir: PathBuf,
}

impl ArchiveInstaller {
    /// Creates an installer for the manifest's artifacts, caching remote
    /// downloads under `cache_dir`.
    #[must_use]
    pub fn new(manifest: &YamlManifest, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest: manifest.clone(),
            cache_dir: cache_dir.into(),
        }
    }

    fn entry(&self, dependency: &Dependency) -> Result<&ManifestDependency> {
        self.manifest
            .dependency(&dependency.name, &dependency.version)
            .ok_or_else(|| StageError::NotFound {
                kind: "dependency",
                id: dependency.to_string(),
            })
    }

    /// Returns a verified local copy of the entry's archive.
    fn fetch(&self, entry: &ManifestDependency, source: &ArtifactSource) -> Result<PathBuf> {
        match source {
            ArtifactSource::Local(path) => {
                hash::validate_hash(path, &entry.sha256)?;
                Ok(path.clone())
            }
            ArtifactSource::Remote(url) => {
                let cached = self
                    .cache_dir
                    .join("dependencies")
                    .join(format!("{}-{}", entry.name, entry.version))
                    .join(source.file_name());
                if cached.is_file() && hash::validate_hash(&cached, &entry.sha256).is_ok() {
                    tracing::debug!(path = %cached.display(), "using cached download");
                    return Ok(cached);
                }
                download(url, &cached)?;
                hash::validate_hash(&cached, &entry.sha256)?;
                Ok(cached)
            }
        }
    }
}

impl Installer for ArchiveInstaller {
    fn install_dependency(&self, dependency: &Dependency, output_dir: &Path) -> Result<()> {
        tracing::info!("-----> Installing {dependency}");
        let entry = self.entry(dependency)?;
        let source = resolve_source(&entry.uri, self.manifest.root_dir())?;
        let archive_path = self.fetch(entry, &source)?;
        archive::extract(&archive_path, &source.file_name(), output_dir)?;
        tracing::debug!(
            dependency = %dependency,
            output = %output_dir.display(),
            "dependency installed"
        );
        Ok(())
    }
}

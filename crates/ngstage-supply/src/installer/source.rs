//! Artifact URI handling.
//!
//! Supports `file://` URIs, bare paths (relative to the buildpack root), and
//! remote `http(s)://` URLs fetched with a blocking client.

use std::path::{Path, PathBuf};

use ngstage_common::error::{Result, StageError};

/// Where a dependency archive comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// Archive already on the local filesystem.
    Local(PathBuf),
    /// Archive to download.
    Remote(String),
}

impl ArtifactSource {
    /// File name of the archive, used to pick the unpacker and cache entry.
    #[must_use]
    pub fn file_name(&self) -> String {
        match self {
            Self::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Self::Remote(url) => {
                let path = url.split(['?', '#']).next().unwrap_or(url);
                path.rsplit('/').next().unwrap_or(path).to_string()
            }
        }
    }
}

/// Resolves an artifact URI.
///
/// # Errors
///
/// Returns an error if the URI uses an unsupported scheme.
pub fn resolve_source(uri: &str, root_dir: &Path) -> Result<ArtifactSource> {
    if let Some(path) = uri.strip_prefix("file://") {
        tracing::debug!(path, "resolved file:// source");
        Ok(ArtifactSource::Local(PathBuf::from(path)))
    } else if uri.starts_with("https://") || uri.starts_with("http://") {
        tracing::debug!(url = uri, "resolved remote source");
        Ok(ArtifactSource::Remote(uri.to_string()))
    } else if uri.contains("://") {
        Err(StageError::Config {
            message: format!("unsupported dependency URI scheme: {uri}"),
        })
    } else {
        Ok(ArtifactSource::Local(root_dir.join(uri)))
    }
}

/// Downloads `url` to `dest`.
///
/// # Errors
///
/// Returns an error on transport failure, a non-success status, or a write
/// failure.
pub fn download(url: &str, dest: &Path) -> Result<()> {
    tracing::info!(url, "downloading");
    let response = reqwest::blocking::get(url).map_err(|e| StageError::Config {
        message: format!("failed to download {url}: {e}"),
    })?;

    if !response.status().is_success() {
        return Err(StageError::Config {
            message: format!("HTTP {} downloading {url}", response.status()),
        });
    }

    let bytes = response.bytes().map_err(|e| StageError::Config {
        message: format!("failed to read response body from {url}: {e}"),
    })?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StageError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(dest, &bytes).map_err(|e| StageError::Io {
        path: dest.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(url, bytes = bytes.len(), "download complete");
    Ok(())
}

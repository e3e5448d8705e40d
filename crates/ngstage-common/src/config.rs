//! Operator configuration model (`buildpack.yml` / `nginx.yml`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{BUILDPACK_YML, NGINX_YML, OPENRESTY_DEPENDENCY};
use crate::error::{Result, StageError};
use crate::types::Distribution;

/// Root of the optional operator configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildpackConfig {
    /// nginx-specific settings.
    pub nginx: NginxConfig,
    /// Distribution name; anything other than `openresty` selects nginx.
    pub dist: String,
}

/// Settings under the `nginx:` key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NginxConfig {
    /// Requested version alias; empty means "use mainline".
    pub version: String,
    /// Environment variables substituted without escaping by `{{env}}`.
    pub plaintext_env_vars: Vec<String>,
}

impl BuildpackConfig {
    /// Loads the configuration from the application root.
    ///
    /// `buildpack.yml` is preferred, `nginx.yml` is the fallback, and an
    /// absent file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be read or parsed.
    pub fn load(build_dir: &Path) -> Result<Self> {
        for name in [BUILDPACK_YML, NGINX_YML] {
            let path = build_dir.join(name);
            if path.is_file() {
                return Self::load_file(&path);
            }
        }
        tracing::debug!(dir = %build_dir.display(), "no operator config file, using defaults");
        Ok(Self::default())
    }

    /// Loads the configuration from an explicit file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "loading operator config");
        let content = std::fs::read_to_string(path).map_err(|e| StageError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Returns the distribution selected by `dist`.
    #[must_use]
    pub fn distribution(&self) -> Distribution {
        if self.dist == OPENRESTY_DEPENDENCY {
            Distribution::OpenResty
        } else {
            Distribution::Nginx
        }
    }
}

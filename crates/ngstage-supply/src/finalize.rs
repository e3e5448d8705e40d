//! Finalize phase: launch-readiness checks on `nginx.conf`.

use std::path::PathBuf;

use ngstage_common::error::Result;
use ngstage_validate::validator::{check_exists, check_port_placeholder};

/// Runs the finalize checks for one build directory.
#[derive(Debug, Clone)]
pub struct Finalizer {
    build_dir: PathBuf,
    dep_dir: PathBuf,
}

impl Finalizer {
    /// Creates a finalizer.
    #[must_use]
    pub fn new(build_dir: impl Into<PathBuf>, dep_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
            dep_dir: dep_dir.into(),
        }
    }

    /// Checks that `nginx.conf` exists and interpolates `{{port}}`.
    ///
    /// # Errors
    ///
    /// Returns `StageError::MissingConfig` or
    /// `StageError::MissingPortPlaceholder`.
    pub fn run(&self) -> Result<()> {
        tracing::info!("-----> Finalizing nginx");
        tracing::debug!(
            build_dir = %self.build_dir.display(),
            dep_dir = %self.dep_dir.display(),
            "finalize"
        );
        let config = check_exists(&self.build_dir)
            .inspect_err(|e| tracing::error!("{e}"))?;
        check_port_placeholder(&config).inspect_err(|e| tracing::error!("{e}"))
    }
}

#[cfg(test)]
mod tests {
    use ngstage_common::constants::NGINX_CONF;
    use ngstage_common::error::StageError;

    use super::*;

    fn finalize(config: Option<&str>) -> Result<()> {
        let dir = tempfile::tempdir().expect("tempdir");
        if let Some(config) = config {
            std::fs::write(dir.path().join(NGINX_CONF), config).expect("write");
        }
        Finalizer::new(dir.path(), dir.path().join("deps/0")).run()
    }

    #[test]
    fn config_with_port_passes() {
        finalize(Some("server { listen {{port}}; }")).expect("finalize");
    }

    #[test]
    fn missing_config_fails() {
        let err = finalize(None).expect_err("should fail");
        assert!(matches!(err, StageError::MissingConfig { .. }));
    }

    #[test]
    fn config_without_port_fails() {
        let err = finalize(Some("server { listen 80; }")).expect_err("should fail");
        assert!(matches!(err, StageError::MissingPortPlaceholder { .. }));
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn port_inside_comment_directive_does_not_count() {
        let err = finalize(Some("server { listen 80; {{/* {{port}} */}} }")).expect_err("should fail");
        assert!(matches!(err, StageError::MissingPortPlaceholder { .. }));
    }
}

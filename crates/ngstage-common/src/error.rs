//! Unified error types for the ngstage workspace.
//!
//! Every fatal staging condition is one variant of [`StageError`]. Advisory
//! conditions (disabled access logging, the "stable" channel) are logged as
//! warnings and never surface here.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum StageError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A downloaded artifact failed checksum validation.
    #[error("hash mismatch for {resource}: expected {expected}, got {actual}")]
    HashMismatch {
        /// Resource that failed validation.
        resource: String,
        /// Expected hash value.
        expected: String,
        /// Actual computed hash value.
        actual: String,
    },

    /// The requested version alias matched no published version.
    #[error("could not determine version: no match found for {requested}")]
    UnresolvableVersion {
        /// Version expression after alias substitution.
        requested: String,
        /// Every known alias, line, and concrete version for diagnostics.
        available: Vec<String>,
    },

    /// The application does not ship a configuration file.
    #[error("{} file must be present at the app root", path.display())]
    MissingConfig {
        /// Expected location of the configuration file.
        path: PathBuf,
    },

    /// The configuration file never interpolates the assigned port.
    #[error("{} file must be configured to respect the value of the port placeholder {{{{port}}}}", path.display())]
    MissingPortPlaceholder {
        /// Configuration file that was checked.
        path: PathBuf,
    },

    /// The top-level configuration file could not be read.
    #[error("could not read config file: {}: {source}", path.display())]
    ConfigUnreadable {
        /// Configuration file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A file referenced by an `include` directive could not be read.
    #[error("could not read config file: {}: {}: {source}", config.display(), include.display())]
    IncludeUnreadable {
        /// Configuration file containing the `include`.
        config: PathBuf,
        /// Include target that failed.
        include: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A directive in the configuration text is malformed.
    #[error("could not parse config file: {}: line {line}: {message}", path.as_deref().map_or_else(|| "<input>".into(), |p| p.display().to_string()))]
    Template {
        /// File the text came from, when known.
        path: Option<PathBuf>,
        /// 1-based line of the offending directive.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// The server binary rejected the expanded configuration.
    #[error("nginx.conf contains syntax errors: {status}")]
    SyntaxCheck {
        /// Exit status reported by the checker.
        status: String,
        /// Standard error of the checker, relayed verbatim.
        stderr: String,
    },

    /// An external command could not be spawned.
    #[error("failed to run {program}: {source}")]
    Command {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// YAML serialization or deserialization failed.
    #[error("yaml error: {source}")]
    Yaml {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },
}

impl StageError {
    /// Attaches a file path to a [`StageError::Template`] raised while
    /// expanding in-memory text.
    #[must_use]
    pub fn with_template_path(self, file: impl Into<PathBuf>) -> Self {
        match self {
            Self::Template {
                path: None,
                line,
                message,
            } => Self::Template {
                path: Some(file.into()),
                line,
                message,
            },
            other => other,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, StageError>;

//! Domain primitive types used across the ngstage workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A dependency pinned to one concrete published version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    /// Dependency name as listed in the manifest.
    pub name: String,
    /// Concrete version, e.g. `1.27.3`.
    pub version: String,
}

impl Dependency {
    /// Creates a dependency from a name and a concrete version.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Server distribution to stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    /// Plain nginx, version selected through the resolver.
    #[default]
    Nginx,
    /// OpenResty, always the newest published version.
    OpenResty,
}

impl Distribution {
    /// Returns the manifest dependency name for this distribution.
    #[must_use]
    pub const fn dependency_name(self) -> &'static str {
        match self {
            Self::Nginx => crate::constants::NGINX_DEPENDENCY,
            Self::OpenResty => crate::constants::OPENRESTY_DEPENDENCY,
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dependency_name())
    }
}

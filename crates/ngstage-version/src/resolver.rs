//! Resolution of a requested alias to one published version.
//!
//! Resolution is a fixed sequence: default the empty alias to `mainline`,
//! substitute a channel alias once, then pick the highest published version
//! matching the resulting expression.

use ngstage_common::constants::{MAINLINE_CHANNEL, STABLE_CHANNEL};
use ngstage_common::error::{Result, StageError};
use ngstage_common::types::Dependency;

use crate::lines::VersionLineTable;
use crate::pattern::{VersionPattern, parse_version};

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The dependency pinned to the selected version.
    pub dependency: Dependency,
    /// The alias exactly as the caller supplied it (possibly empty).
    pub requested: String,
}

impl Resolution {
    /// Whether the caller asked for a version rather than taking the default.
    #[must_use]
    pub fn is_explicit(&self) -> bool {
        !self.requested.is_empty()
    }

    /// Human-readable summary logged at the start of installation.
    #[must_use]
    pub fn describe(&self) -> String {
        if self.is_explicit() {
            format!(
                "Requested {} version: {} => {}",
                self.dependency.name, self.requested, self.dependency.version
            )
        } else {
            format!(
                "No {} version specified - using {MAINLINE_CHANNEL} => {}",
                self.dependency.name, self.dependency.version
            )
        }
    }
}

/// Resolves version aliases against a channel table.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    lines: VersionLineTable,
}

impl VersionResolver {
    /// Creates a resolver over the given channel table.
    #[must_use]
    pub const fn new(lines: VersionLineTable) -> Self {
        Self { lines }
    }

    /// Resolves `requested` for dependency `name` against `available`.
    ///
    /// # Errors
    ///
    /// Returns `StageError::Config` if the alias is empty and the table has
    /// no `mainline` line, or `StageError::UnresolvableVersion` (carrying the
    /// diagnostic list) if no published version matches.
    pub fn resolve(&self, name: &str, requested: &str, available: &[String]) -> Result<Resolution> {
        let expr = if requested.is_empty() {
            self.lines
                .get(MAINLINE_CHANNEL)
                .ok_or_else(|| StageError::Config {
                    message: format!("could not find {MAINLINE_CHANNEL} version line in manifest"),
                })?
        } else {
            self.lines.get(requested).unwrap_or(requested)
        };
        tracing::debug!(name, requested, expr, "resolving version");

        let version = highest_match(expr, available).ok_or_else(|| {
            StageError::UnresolvableVersion {
                requested: expr.to_string(),
                available: self.available_versions(available),
            }
        })?;

        Ok(Resolution {
            dependency: Dependency::new(name, version),
            requested: requested.to_string(),
        })
    }

    /// Diagnostic list: channels, then line prefixes, then published versions.
    #[must_use]
    pub fn available_versions(&self, available: &[String]) -> Vec<String> {
        self.lines
            .channels()
            .chain(self.lines.lines())
            .map(str::to_string)
            .chain(available.iter().cloned())
            .collect()
    }

    /// Whether `version` belongs to the `stable` channel.
    #[must_use]
    pub fn is_stable_line(&self, version: &str) -> bool {
        let Some(stable) = self.lines.get(STABLE_CHANNEL) else {
            return false;
        };
        highest_match(stable, &[version.to_string()]).is_some()
    }
}

/// Returns the greatest version in `available` matching `expr`.
fn highest_match(expr: &str, available: &[String]) -> Option<String> {
    let pattern = VersionPattern::parse(expr)?;
    available
        .iter()
        .filter_map(|raw| parse_version(raw).map(|v| (v, raw)))
        .filter(|(v, _)| pattern.matches(v))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, raw)| raw.clone())
}

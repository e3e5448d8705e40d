//! Dotted version expressions with wildcard segments.
//!
//! `1.26.x`, `1.26.*`, `1.26.` and `1.26` all select any patch of the
//! 1.26 line; `1.26.2` selects exactly that version.

use semver::Version;

/// One component of a version expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Exact(u64),
    Any,
}

/// A parsed version expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPattern {
    segments: Vec<Segment>,
}

impl VersionPattern {
    /// Parses a version expression.
    ///
    /// Returns `None` when the expression is not dotted-numeric with
    /// optional wildcards, or has more than three components.
    #[must_use]
    pub fn parse(expr: &str) -> Option<Self> {
        let expr = expr.trim();
        let expr = expr.strip_prefix('v').unwrap_or(expr);
        let expr = expr.strip_suffix('.').unwrap_or(expr);
        if expr.is_empty() {
            return None;
        }

        let segments = expr
            .split('.')
            .map(|part| match part {
                "x" | "X" | "*" => Some(Segment::Any),
                digits => digits.parse::<u64>().ok().map(Segment::Exact),
            })
            .collect::<Option<Vec<_>>>()?;

        if segments.len() > 3 {
            return None;
        }
        Some(Self { segments })
    }

    /// Returns whether a version satisfies this expression.
    ///
    /// Pre-release versions never match.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        if !version.pre.is_empty() {
            return false;
        }
        let components = [version.major, version.minor, version.patch];
        self.segments
            .iter()
            .zip(components)
            .all(|(segment, component)| match segment {
                Segment::Exact(n) => *n == component,
                Segment::Any => true,
            })
    }
}

/// Parses a published version string leniently.
///
/// Accepts full semantic versions and one- or two-component versions,
/// padding the missing components with zero. Versions with more than three
/// numeric components (e.g. `1.13.6.2`) are not representable and yield
/// `None`.
#[must_use]
pub fn parse_version(raw: &str) -> Option<Version> {
    if let Ok(v) = Version::parse(raw) {
        return Some(v);
    }
    let parts = raw
        .split('.')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [major] => Some(Version::new(*major, 0, 0)),
        [major, minor] => Some(Version::new(*major, *minor, 0)),
        _ => None,
    }
}

//! Channel alias table (`version_lines` in the manifest).
//!
//! A one-level indirection from a channel name to a version prefix. The
//! empty key is permitted and stands for "unspecified".

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Immutable mapping from channel alias to version prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionLineTable(BTreeMap<String, String>);

impl VersionLineTable {
    /// Creates a table from alias/prefix pairs.
    pub fn new<I, K, V>(lines: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            lines
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Looks up the prefix for an alias.
    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.0.get(alias).map(String::as_str)
    }

    /// Named channels in sorted order, excluding the empty alias.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str).filter(|k| !k.is_empty())
    }

    /// Distinct line prefixes of the named channels, sorted.
    #[must_use]
    pub fn lines(&self) -> BTreeSet<&str> {
        self.0
            .iter()
            .filter(|(k, _)| !k.is_empty())
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> VersionLineTable {
        VersionLineTable::new([
            ("", "1.13.x"),
            ("mainline", "1.13.x"),
            ("stable", "1.12.x"),
        ])
    }

    #[test]
    fn channels_skip_empty_alias_and_are_sorted() {
        let t = table();
        let channels: Vec<_> = t.channels().collect();
        assert_eq!(channels, vec!["mainline", "stable"]);
    }

    #[test]
    fn lines_are_deduplicated_and_sorted() {
        let t = table();
        let lines: Vec<_> = t.lines().into_iter().collect();
        assert_eq!(lines, vec!["1.12.x", "1.13.x"]);
    }

    #[test]
    fn deserializes_from_manifest_map() {
        let t: VersionLineTable =
            serde_yaml::from_str("mainline: 1.27.x\nstable: 1.26.x\n").expect("parse");
        assert_eq!(t.get("mainline"), Some("1.27.x"));
        assert_eq!(t.get("stable"), Some("1.26.x"));
        assert_eq!(t.get("legacy"), None);
    }
}

//! # ngstage-version
//!
//! Maps a requested version alias onto one published artifact version.
//!
//! Handles:
//! - **Lines**: The channel table (`mainline`, `stable`, ...) loaded from the manifest.
//! - **Pattern**: Dotted version expressions with `x` wildcards.
//! - **Resolver**: Alias substitution, highest-match selection, and diagnostics.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod lines;
pub mod pattern;
pub mod resolver;

pub use lines::VersionLineTable;
pub use pattern::{VersionPattern, parse_version};
pub use resolver::{Resolution, VersionResolver};

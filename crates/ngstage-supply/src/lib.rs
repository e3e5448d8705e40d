//! # ngstage-supply
//!
//! The buildpack phases that stage nginx or OpenResty into an application.
//!
//! Handles:
//! - **Supplier**: Support-binary install, config and manifest loading,
//!   server install for the resolved version, validation, and profile scripts.
//! - **Finalizer**: Launch-readiness checks on `nginx.conf`.
//! - **Manifest**: Published versions and version lines from `manifest.yml`.
//! - **Installer**: Fetching, verifying, and unpacking dependency archives.
//! - **Stager**: Build, cache, and dependency directory layout.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod finalize;
pub mod installer;
pub mod manifest;
pub mod stager;
pub mod supplier;

pub use finalize::Finalizer;
pub use installer::{ArchiveInstaller, Installer};
pub use manifest::{Manifest, ManifestDependency, YamlManifest};
pub use stager::{BuildpackStager, Stager};
pub use supplier::Supplier;

//! `ngstage supply`: install the server and validate the app's config.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use ngstage_common::constants::DEFAULT_RESOLV_CONF;
use ngstage_supply::{ArchiveInstaller, BuildpackStager, Supplier, YamlManifest};
use ngstage_validate::SystemRunner;

use super::{ManifestLoad, StagingDirs};

/// Arguments for the `supply` command.
#[derive(Args, Debug)]
pub struct SupplyArgs {
    /// Staging directories.
    #[command(flatten)]
    pub dirs: StagingDirs,

    /// Buildpack root containing `manifest.yml`; defaults to the parent of
    /// the directory holding this binary.
    #[arg(long, env = "BUILDPACK_DIR")]
    pub buildpack_dir: Option<PathBuf>,

    /// Resolver configuration read for `{{nameservers}}`.
    #[arg(long, default_value = DEFAULT_RESOLV_CONF)]
    pub resolv_conf: PathBuf,
}

/// Executes the `supply` command.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded or any supply step
/// fails.
pub fn execute(args: SupplyArgs) -> anyhow::Result<()> {
    let buildpack_dir = match args.buildpack_dir {
        Some(dir) => dir,
        None => super::buildpack_root()?,
    };
    tracing::debug!(buildpack_dir = %buildpack_dir.display(), "buildpack root");

    let manifest = YamlManifest::load(&buildpack_dir).context(ManifestLoad)?;
    let installer = ArchiveInstaller::new(&manifest, &args.dirs.cache_dir);
    let stager = BuildpackStager::new(
        args.dirs.build_dir,
        args.dirs.deps_dir,
        args.dirs.deps_idx,
    );

    let outcome = Supplier::new(
        Box::new(stager),
        Box::new(manifest),
        Box::new(installer),
        Box::new(SystemRunner),
    )
    .with_env(super::unicode_env(std::env::vars_os()))
    .with_resolv_conf(args.resolv_conf)
    .run()?;
    tracing::debug!(?outcome, "supply complete");
    Ok(())
}

//! `ngstage finalize`: check that `nginx.conf` is ready to launch.

use clap::Args;
use ngstage_supply::Finalizer;

use super::StagingDirs;

/// Arguments for the `finalize` command.
#[derive(Args, Debug)]
pub struct FinalizeArgs {
    /// Staging directories.
    #[command(flatten)]
    pub dirs: StagingDirs,
}

/// Executes the `finalize` command.
///
/// # Errors
///
/// Returns an error if `nginx.conf` is missing or ignores `{{port}}`.
pub fn execute(args: FinalizeArgs) -> anyhow::Result<()> {
    let dep_dir = args.dirs.deps_dir.join(&args.dirs.deps_idx);
    Finalizer::new(args.dirs.build_dir, dep_dir).run()?;
    Ok(())
}

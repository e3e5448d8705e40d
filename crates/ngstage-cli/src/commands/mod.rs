//! CLI command definitions and dispatch.

pub mod finalize;
pub mod render;
pub mod supply;

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// ngstage: stage nginx or OpenResty into an application.
#[derive(Parser, Debug)]
#[command(name = "ngstage", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install the server, validate nginx.conf, and write profile scripts.
    Supply(supply::SupplyArgs),
    /// Check that nginx.conf is ready to launch.
    Finalize(finalize::FinalizeArgs),
    /// Expand the directives in a config file and its includes in place.
    Render(render::RenderArgs),
}

impl Command {
    /// Exit status reported when this command fails.
    #[must_use]
    pub const fn failure_code(&self) -> u8 {
        match self {
            Self::Supply(_) => 14,
            Self::Finalize(_) => 12,
            Self::Render(_) => 1,
        }
    }
}

/// Positional directories shared by the buildpack phases.
#[derive(Args, Debug)]
pub struct StagingDirs {
    /// Application build directory.
    pub build_dir: PathBuf,
    /// Cache directory persisted between builds.
    pub cache_dir: PathBuf,
    /// Shared dependencies directory.
    pub deps_dir: PathBuf,
    /// Index of this buildpack within the dependencies directory.
    pub deps_idx: String,
}

/// Marker attached to errors raised while loading `manifest.yml`.
#[derive(Debug, Clone, Copy)]
pub struct ManifestLoad;

impl fmt::Display for ManifestLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unable to load buildpack manifest")
    }
}

/// Maps a failure to its exit status.
#[must_use]
pub fn exit_code(err: &anyhow::Error, command_code: u8) -> u8 {
    if err.downcast_ref::<ManifestLoad>().is_some() {
        10
    } else {
        command_code
    }
}

/// Buildpack root inferred from the running binary, `<root>/bin/ngstage`.
///
/// # Errors
///
/// Returns an error if the executable path cannot be determined.
pub fn buildpack_root() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    exe.parent()
        .and_then(std::path::Path::parent)
        .map(std::path::Path::to_path_buf)
        .ok_or_else(|| anyhow::anyhow!("cannot locate buildpack root from {}", exe.display()))
}

/// Keeps the environment entries whose name and value are valid Unicode.
pub fn unicode_env(vars: impl IntoIterator<Item = (OsString, OsString)>) -> Vec<(String, String)> {
    vars.into_iter()
        .filter_map(|(name, value)| match (name.into_string(), value.into_string()) {
            (Ok(name), Ok(value)) => Some((name, value)),
            (name, _) => {
                tracing::debug!(
                    name = %name.map_or_else(|n| n.to_string_lossy().into_owned(), |n| n),
                    "skipping non-unicode environment variable"
                );
                None
            }
        })
        .collect()
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Supply(args) => supply::execute(args),
        Command::Finalize(args) => finalize::execute(args),
        Command::Render(args) => render::execute(args),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn failure_codes_per_command() {
        let cli = Cli::parse_from(["ngstage", "supply", "/b", "/c", "/d", "0"]);
        assert_eq!(cli.command.failure_code(), 14);
        let cli = Cli::parse_from(["ngstage", "finalize", "/b", "/c", "/d", "0"]);
        assert_eq!(cli.command.failure_code(), 12);
        let cli = Cli::parse_from(["ngstage", "render", "nginx.conf", "/local", "/global"]);
        assert_eq!(cli.command.failure_code(), 1);
    }

    #[test]
    fn manifest_failures_exit_with_ten() {
        let err = Err::<(), _>(anyhow::anyhow!("missing file"))
            .context(ManifestLoad)
            .expect_err("error");
        assert_eq!(exit_code(&err, 14), 10);
        assert_eq!(exit_code(&anyhow::anyhow!("other"), 14), 14);
    }

    #[cfg(unix)]
    #[test]
    fn non_unicode_environment_entries_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let env = unicode_env([
            (OsString::from("GOOD"), OsString::from("value")),
            (OsString::from("BAD_VALUE"), OsString::from_vec(vec![0xff, 0xfe])),
            (OsString::from_vec(vec![0xff]), OsString::from("x")),
        ]);
        assert_eq!(env, vec![("GOOD".to_string(), "value".to_string())]);
    }
}

//! `ngstage render`: expand `nginx.conf` directives in place at launch.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use ngstage_common::config::BuildpackConfig;
use ngstage_common::constants::{DEFAULT_NAMESERVER, DEFAULT_RESOLV_CONF};
use ngstage_template::nameservers::read_nameservers;
use ngstage_template::{ModulePaths, RenderContext, TemplateEngine};

/// Arguments for the `render` command.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Config file to rewrite in place.
    pub config: PathBuf,

    /// Operator-supplied module directory, searched first.
    pub local_modules: PathBuf,

    /// Module directory shipped with the server.
    pub global_modules: PathBuf,

    /// Resolver configuration; empty selects the default.
    #[arg(default_value = DEFAULT_RESOLV_CONF, hide_default_value = true)]
    pub resolv_conf: String,

    /// Nameserver used when the resolver configuration lists none; empty
    /// selects the default.
    #[arg(default_value = DEFAULT_NAMESERVER, hide_default_value = true)]
    pub default_nameserver: String,

    /// Operator config listing the variables `{{env}}` substitutes unescaped.
    #[arg(long)]
    pub buildpack_yml_path: Option<PathBuf>,

    /// Port substituted for `{{port}}`.
    #[arg(long, env = "PORT", default_value = "")]
    pub port: String,
}

/// Executes the `render` command.
///
/// # Errors
///
/// Returns an error if the operator config is malformed or the config file
/// or one of its includes cannot be read, parsed, or written.
pub fn execute(args: RenderArgs) -> anyhow::Result<()> {
    let resolv_conf = non_empty_or(&args.resolv_conf, DEFAULT_RESOLV_CONF);
    let default_nameserver = non_empty_or(&args.default_nameserver, DEFAULT_NAMESERVER);
    let nameservers = read_nameservers(Path::new(resolv_conf), default_nameserver);

    let plaintext = match &args.buildpack_yml_path {
        Some(path) if path.is_file() => BuildpackConfig::load_file(path)?.nginx.plaintext_env_vars,
        _ => Vec::new(),
    };

    let context = RenderContext::new(args.port)
        .with_env(super::unicode_env(std::env::vars_os()))
        .with_plaintext_env(plaintext)
        .with_modules(ModulePaths::new(args.local_modules, args.global_modules))
        .with_nameservers(nameservers);

    let include_root = std::env::current_dir().context("cannot determine working directory")?;
    let files = TemplateEngine::new(context).expand_file(&args.config, &include_root)?;
    tracing::debug!(files = files.len(), "rendered config");
    Ok(())
}

fn non_empty_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() { default } else { value }
}

//! Supply phase orchestration.
//!
//! Steps run in a fixed order and any failure aborts the phase after
//! logging `Could not <step>: <error>`:
//!
//! 1. copy the support binary into the dependency directory;
//! 2. load the operator config and the manifest's version lines, and
//!    create the app's `logs` directory;
//! 3. install nginx (resolved version) or OpenResty (newest version);
//! 4. validate `nginx.conf`;
//! 5. write the profile scripts.

use std::collections::BTreeMap;
use std::path::PathBuf;

use ngstage_common::config::BuildpackConfig;
use ngstage_common::constants::{
    DEFAULT_NAMESERVER, DEFAULT_RESOLV_CONF, LOGS_DIR, NGINX_DEPENDENCY, OPENRESTY_DEPENDENCY,
    SUPPORT_BINARY,
};
use ngstage_common::error::{Result, StageError};
use ngstage_common::types::{Dependency, Distribution};
use ngstage_template::nameservers::read_nameservers;
use ngstage_validate::{CommandRunner, ConfigValidator, SyntaxCheck, ValidationOutcome};
use ngstage_version::{VersionLineTable, VersionResolver};

use crate::installer::Installer;
use crate::manifest::Manifest;
use crate::stager::Stager;

/// Advisory logged when the resolved nginx belongs to the stable line.
pub const STABLE_WARNING: &str =
    "Warning: usage of \"stable\" versions of NGINX is discouraged in most cases by the NGINX team.";

/// Runs the supply phase against injected collaborators.
pub struct Supplier {
    stager: Box<dyn Stager>,
    manifest: Box<dyn Manifest>,
    installer: Box<dyn Installer>,
    runner: Box<dyn CommandRunner>,
    env: BTreeMap<String, String>,
    resolv_conf: PathBuf,
    config: BuildpackConfig,
    lines: VersionLineTable,
}

impl std::fmt::Debug for Supplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supplier")
            .field("build_dir", &self.stager.build_dir())
            .field("dep_dir", &self.stager.dep_dir())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Supplier {
    /// Creates a supplier. The environment snapshot starts empty.
    #[must_use]
    pub fn new(
        stager: Box<dyn Stager>,
        manifest: Box<dyn Manifest>,
        installer: Box<dyn Installer>,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        Self {
            stager,
            manifest,
            installer,
            runner,
            env: BTreeMap::new(),
            resolv_conf: PathBuf::from(DEFAULT_RESOLV_CONF),
            config: BuildpackConfig::default(),
            lines: VersionLineTable::default(),
        }
    }

    /// Sets the environment visible to the syntax check.
    #[must_use]
    pub fn with_env<I>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env = env.into_iter().collect();
        self
    }

    /// Sets the resolver configuration read for `{{nameservers}}`.
    #[must_use]
    pub fn with_resolv_conf(mut self, path: impl Into<PathBuf>) -> Self {
        self.resolv_conf = path.into();
        self
    }

    /// Returns the operator config loaded by [`Self::setup`].
    #[must_use]
    pub const fn config(&self) -> &BuildpackConfig {
        &self.config
    }

    /// Runs every step of the supply phase.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing step.
    pub fn run(&mut self) -> Result<ValidationOutcome> {
        tracing::info!("-----> Supplying nginx");

        logged("copy support binary", self.install_support_binary())?;
        logged("setup", self.setup())?;
        match self.config.distribution() {
            Distribution::OpenResty => logged("install openresty", self.install_openresty())?,
            Distribution::Nginx => logged("install nginx", self.install_nginx())?,
        }
        let outcome = logged("validate nginx.conf", self.validate())?;
        logged("write profile.d", self.write_profile_d())?;
        Ok(outcome)
    }

    /// Copies the support binary into `<dep_dir>/bin` unless already there.
    ///
    /// # Errors
    ///
    /// Returns an error if the binary cannot be copied.
    pub fn install_support_binary(&self) -> Result<()> {
        let bin_dir = self.stager.dep_dir().join("bin");
        let dest = bin_dir.join(SUPPORT_BINARY);
        if dest.is_file() {
            tracing::debug!(path = %dest.display(), "support binary already present");
            return Ok(());
        }
        let src = self.manifest.root_dir().join("bin").join(SUPPORT_BINARY);
        std::fs::create_dir_all(&bin_dir).map_err(|e| StageError::Io {
            path: bin_dir.clone(),
            source: e,
        })?;
        let _ = std::fs::copy(&src, &dest).map_err(|e| StageError::Io {
            path: src.clone(),
            source: e,
        })?;
        tracing::debug!(from = %src.display(), to = %dest.display(), "copied support binary");
        Ok(())
    }

    /// Loads the operator config and version lines and creates `logs`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be parsed or the directory
    /// cannot be created.
    pub fn setup(&mut self) -> Result<()> {
        self.config = BuildpackConfig::load(self.stager.build_dir())?;
        self.lines = self.manifest.version_lines();

        let logs = self.stager.build_dir().join(LOGS_DIR);
        std::fs::create_dir_all(&logs).map_err(|e| StageError::Io {
            path: logs.clone(),
            source: e,
        })?;
        tracing::debug!(dist = %self.config.distribution(), "setup complete");
        Ok(())
    }

    /// Resolves the requested nginx version and installs it.
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be resolved or installed.
    pub fn install_nginx(&self) -> Result<()> {
        let versions = self.manifest.all_dependency_versions(NGINX_DEPENDENCY);
        let resolver = VersionResolver::new(self.lines.clone());
        let resolution = resolver
            .resolve(NGINX_DEPENDENCY, &self.config.nginx.version, &versions)
            .inspect_err(|_| {
                tracing::info!(
                    "Available versions: {}",
                    resolver.available_versions(&versions).join(", ")
                );
            })?;
        tracing::info!("-----> {}", resolution.describe());

        if resolver.is_stable_line(&resolution.dependency.version) {
            tracing::warn!("{STABLE_WARNING}");
        }

        self.install(&resolution.dependency, &["sbin", "nginx"])
    }

    /// Installs the newest published OpenResty.
    ///
    /// # Errors
    ///
    /// Returns an error if no version is published or installation fails.
    pub fn install_openresty(&self) -> Result<()> {
        let versions = self.manifest.all_dependency_versions(OPENRESTY_DEPENDENCY);
        let version = versions.last().ok_or_else(|| StageError::NotFound {
            kind: "dependency version",
            id: OPENRESTY_DEPENDENCY.into(),
        })?;
        let dependency = Dependency::new(OPENRESTY_DEPENDENCY, version.clone());
        tracing::info!("-----> Using {dependency}");
        self.install(&dependency, &["nginx", "sbin", "nginx"])
    }

    fn install(&self, dependency: &Dependency, binary: &[&str]) -> Result<()> {
        let dir = self.stager.dep_dir().join("nginx");
        self.installer.install_dependency(dependency, &dir)?;
        let target = binary.iter().fold(dir, |path, part| path.join(part));
        self.stager.add_bin_dependency_link(&target, "nginx")
    }

    /// Validates the app's `nginx.conf` against the installed server.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn validate(&self) -> Result<ValidationOutcome> {
        let dep_dir = self.stager.dep_dir();
        let install_dir = dep_dir.join("nginx");
        let syntax = SyntaxCheck {
            nginx_binary: dep_dir.join("bin").join("nginx"),
            global_modules: install_dir.join("modules"),
            library_path: (self.config.distribution() == Distribution::OpenResty)
                .then(|| install_dir.join("luajit").join("lib")),
            path_env: self.env.get("PATH").cloned().unwrap_or_default(),
            env: self.env.clone(),
            plaintext_env: self.config.nginx.plaintext_env_vars.clone(),
            nameservers: read_nameservers(&self.resolv_conf, DEFAULT_NAMESERVER),
        };
        ConfigValidator::new(self.stager.build_dir(), syntax, self.runner.as_ref()).validate()
    }

    /// Writes the launch-time profile scripts.
    ///
    /// # Errors
    ///
    /// Returns an error if a script cannot be written.
    pub fn write_profile_d(&self) -> Result<()> {
        let idx = self.stager.deps_idx();
        if self.config.distribution() == Distribution::OpenResty {
            self.stager.write_profile_d(
                OPENRESTY_DEPENDENCY,
                &format!(
                    "export LD_LIBRARY_PATH=$LD_LIBRARY_PATH:$DEPS_DIR/{idx}/nginx/luajit/lib\nexport LUA_PATH=$DEPS_DIR/{idx}/nginx/lualib/?.lua\n"
                ),
            )?;
        }
        self.stager.write_profile_d(
            NGINX_DEPENDENCY,
            &format!("export DEP_DIR=$DEPS_DIR/{idx}\nmkdir -p {LOGS_DIR}"),
        )
    }
}

fn logged<T>(step: &str, result: Result<T>) -> Result<T> {
    result.inspect_err(|e| tracing::error!("Could not {step}: {e}"))
}

//! Staged validation of an application's `nginx.conf`.
//!
//! The steps run in order and stop at the first failure:
//!
//! 1. the config file exists at the app root;
//! 2. a dry run with a random marker proves `{{port}}` is interpolated;
//! 3. a scratch copy of the app, expanded for port 8080, passes `nginx -t`;
//! 4. an advisory is logged when access logging looks disabled.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use ngstage_common::constants::{NGINX_CONF, PORT_ENV, SYNTAX_CHECK_PORT};
use ngstage_common::error::{Result, StageError};
use ngstage_template::{Confinement, ModulePaths, PortProbe, RenderContext, TemplateEngine, expand};
use regex::{Regex, RegexBuilder};

use crate::command::{CommandRunner, CommandSpec};
use crate::copy::copy_dir;

/// Advisory logged when access logging appears to be disabled.
pub const ACCESS_LOG_WARNING: &str = "Warning: access logging is turned off in your nginx.conf file, this may make your app difficult to debug.";

#[allow(clippy::expect_used)]
static ACCESS_LOG_OFF: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"access_log\s+off")
        .case_insensitive(true)
        .build()
        .expect("access_log pattern is valid")
});

/// Result of a successful validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// `nginx.conf` is present.
    pub exists: bool,
    /// The dry run found the port marker.
    pub has_port_placeholder: bool,
    /// `nginx -t` accepted the expanded copy.
    pub syntax_ok: bool,
    /// Access logging appears to be enabled.
    pub access_logging_enabled: bool,
}

/// Inputs of the isolated syntax check.
#[derive(Debug, Clone, Default)]
pub struct SyntaxCheck {
    /// Server binary run with `-t`.
    pub nginx_binary: PathBuf,
    /// Modules shipped with the installed server.
    pub global_modules: PathBuf,
    /// Extra shared-library directory, set for OpenResty.
    pub library_path: Option<PathBuf>,
    /// `PATH` handed to the checker.
    pub path_env: String,
    /// Environment snapshot visible to `{{env}}`.
    pub env: BTreeMap<String, String>,
    /// Variables substituted without escaping.
    pub plaintext_env: Vec<String>,
    /// Nameservers for `{{nameservers}}`.
    pub nameservers: Vec<String>,
}

/// Validates the `nginx.conf` of one build directory.
pub struct ConfigValidator<'a> {
    build_dir: PathBuf,
    syntax: SyntaxCheck,
    runner: &'a dyn CommandRunner,
}

impl std::fmt::Debug for ConfigValidator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigValidator")
            .field("build_dir", &self.build_dir)
            .field("syntax", &self.syntax)
            .finish_non_exhaustive()
    }
}

impl<'a> ConfigValidator<'a> {
    /// Creates a validator for `build_dir`.
    #[must_use]
    pub fn new(build_dir: impl Into<PathBuf>, syntax: SyntaxCheck, runner: &'a dyn CommandRunner) -> Self {
        Self {
            build_dir: build_dir.into(),
            syntax,
            runner,
        }
    }

    /// Runs every validation step.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing step.
    pub fn validate(&self) -> Result<ValidationOutcome> {
        let config = check_exists(&self.build_dir)?;
        check_port_placeholder(&config)?;
        self.check_syntax()?;

        let text = read_config(&config)?;
        let access_logging_enabled = access_logging_enabled(&text);
        if !access_logging_enabled {
            tracing::warn!("{ACCESS_LOG_WARNING}");
        }

        Ok(ValidationOutcome {
            exists: true,
            has_port_placeholder: true,
            syntax_ok: true,
            access_logging_enabled,
        })
    }

    /// Expands a scratch copy of the build directory and runs `nginx -t`.
    ///
    /// The scratch directory is removed on every exit path. Only files inside
    /// it are rewritten; absolute includes pointing into the build directory
    /// are redirected to their copies.
    ///
    /// # Errors
    ///
    /// Returns a template error if the copy cannot be expanded, or
    /// `StageError::SyntaxCheck` if the checker rejects it.
    pub fn check_syntax(&self) -> Result<()> {
        let scratch = tempfile::Builder::new()
            .prefix("conf")
            .tempdir()
            .map_err(|e| StageError::Io {
                path: std::env::temp_dir(),
                source: e,
            })?;
        let copy = scratch.path();
        copy_dir(&self.build_dir, copy)?;

        let config = copy.join(NGINX_CONF);
        let port = SYNTAX_CHECK_PORT.to_string();
        let context = RenderContext::new(port.clone())
            .with_env(self.syntax.env.clone())
            .with_plaintext_env(self.syntax.plaintext_env.iter().cloned())
            .with_modules(ModulePaths::new(
                self.build_dir.join(ngstage_common::constants::LOCAL_MODULES_DIR),
                &self.syntax.global_modules,
            ))
            .with_nameservers(self.syntax.nameservers.clone());
        let confinement = Confinement::new(copy).with_origin(&self.build_dir);
        let _ = TemplateEngine::new(context)
            .with_confinement(confinement)
            .expand_file(&config, copy)?;

        let mut spec = CommandSpec::new(&self.syntax.nginx_binary)
            .args([
                "-t".to_string(),
                "-c".to_string(),
                config.display().to_string(),
                "-p".to_string(),
                copy.display().to_string(),
            ])
            .cwd(copy)
            .env("PATH", self.syntax.path_env.clone())
            .env(PORT_ENV, port);
        if let Some(lib) = &self.syntax.library_path {
            spec = spec.env("LD_LIBRARY_PATH", lib.display().to_string());
        }

        let output = self.runner.run(&spec)?;
        if output.success() {
            tracing::debug!("nginx.conf syntax check passed");
            return Ok(());
        }

        for line in output.stderr.lines() {
            tracing::error!("{line}");
        }
        Err(StageError::SyntaxCheck {
            status: format!("exit status {}", output.exit_code),
            stderr: output.stderr,
        })
    }
}

/// Confirms `nginx.conf` exists at the root of `build_dir`.
///
/// # Errors
///
/// Returns `StageError::MissingConfig` if it does not.
pub fn check_exists(build_dir: &Path) -> Result<PathBuf> {
    let config = build_dir.join(NGINX_CONF);
    let exists = config.try_exists().map_err(|e| StageError::Io {
        path: config.clone(),
        source: e,
    })?;
    if exists {
        Ok(config)
    } else {
        Err(StageError::MissingConfig {
            path: PathBuf::from(NGINX_CONF),
        })
    }
}

/// Dry-run expansion proving the config interpolates `{{port}}`.
///
/// Only the file itself is checked, not its includes.
///
/// # Errors
///
/// Returns `StageError::MissingPortPlaceholder` if the marker never appears,
/// or a template error if the config cannot be parsed.
pub fn check_port_placeholder(config: &Path) -> Result<()> {
    let text = read_config(config)?;
    let probe = PortProbe::random();
    let expanded = expand(&text, &probe).map_err(|e| e.with_template_path(config))?;
    if probe.found_in(&expanded) {
        Ok(())
    } else {
        Err(StageError::MissingPortPlaceholder {
            path: PathBuf::from(NGINX_CONF),
        })
    }
}

/// Whether the raw config text leaves access logging enabled.
#[must_use]
pub fn access_logging_enabled(text: &str) -> bool {
    text.contains("access_log") && !ACCESS_LOG_OFF.is_match(text)
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| StageError::ConfigUnreadable {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::command::CommandOutput;

    /// Records each command and the config it saw, then replies with a
    /// canned result.
    #[derive(Default)]
    struct FakeRunner {
        exit_code: i32,
        stderr: String,
        seen: RefCell<Vec<(CommandSpec, String)>>,
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            let config = spec
                .args
                .get(2)
                .and_then(|p| std::fs::read_to_string(p).ok())
                .unwrap_or_default();
            self.seen.borrow_mut().push((spec.clone(), config));
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: self.stderr.clone(),
                exit_code: self.exit_code,
            })
        }
    }

    fn build_dir(config: Option<&str>) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        if let Some(config) = config {
            std::fs::write(dir.path().join(NGINX_CONF), config).expect("write");
        }
        dir
    }

    fn syntax() -> SyntaxCheck {
        SyntaxCheck {
            nginx_binary: PathBuf::from("/deps/0/bin/nginx"),
            global_modules: PathBuf::from("/deps/0/nginx/modules"),
            path_env: "/usr/bin:/bin".into(),
            ..SyntaxCheck::default()
        }
    }

    const GOOD: &str = "events {}\nhttp { access_log /dev/stdout; server { listen {{port}}; } }\n";

    #[test]
    fn missing_config_fails_presence_check() {
        let dir = build_dir(None);
        let runner = FakeRunner::default();
        let err = ConfigValidator::new(dir.path(), syntax(), &runner)
            .validate()
            .expect_err("should fail");
        assert_eq!(err.to_string(), "nginx.conf file must be present at the app root");
        assert!(runner.seen.borrow().is_empty());
    }

    #[test]
    fn config_without_port_fails_with_port_message() {
        let dir = build_dir(Some("events {}\nhttp { server { listen 80; } }\n"));
        let runner = FakeRunner::default();
        let err = ConfigValidator::new(dir.path(), syntax(), &runner)
            .validate()
            .expect_err("should fail");
        assert!(err.to_string().contains("port"));
        assert!(runner.seen.borrow().is_empty());
    }

    #[test]
    fn valid_config_passes_every_step() {
        let dir = build_dir(Some(GOOD));
        let runner = FakeRunner::default();
        let outcome = ConfigValidator::new(dir.path(), syntax(), &runner)
            .validate()
            .expect("valid");
        assert_eq!(
            outcome,
            ValidationOutcome {
                exists: true,
                has_port_placeholder: true,
                syntax_ok: true,
                access_logging_enabled: true,
            }
        );
    }

    #[test]
    fn syntax_check_runs_on_expanded_copy() {
        let dir = build_dir(Some(GOOD));
        let runner = FakeRunner::default();
        ConfigValidator::new(dir.path(), syntax(), &runner)
            .check_syntax()
            .expect("valid");

        let seen = runner.seen.borrow();
        let (spec, config) = seen.first().expect("one command");
        assert_eq!(spec.program, PathBuf::from("/deps/0/bin/nginx"));
        assert_eq!(spec.args.first().map(String::as_str), Some("-t"));
        assert_eq!(spec.env_value("PORT"), Some("8080"));
        assert_eq!(spec.env_value("PATH"), Some("/usr/bin:/bin"));
        assert_eq!(spec.env_value("LD_LIBRARY_PATH"), None);
        assert!(config.contains("listen 8080;"));
        assert!(!spec.args[2].starts_with(&dir.path().display().to_string()));

        // The app's own file is untouched.
        let original = std::fs::read_to_string(dir.path().join(NGINX_CONF)).expect("read");
        assert_eq!(original, GOOD);
    }

    #[test]
    fn scratch_copy_is_removed_afterwards() {
        let dir = build_dir(Some(GOOD));
        let runner = FakeRunner::default();
        ConfigValidator::new(dir.path(), syntax(), &runner)
            .check_syntax()
            .expect("valid");
        let seen = runner.seen.borrow();
        let (spec, _) = seen.first().expect("one command");
        assert!(!Path::new(&spec.args[4]).exists());
    }

    #[test]
    fn openresty_check_sets_library_path() {
        let dir = build_dir(Some(GOOD));
        let runner = FakeRunner::default();
        let syntax = SyntaxCheck {
            library_path: Some(PathBuf::from("/deps/0/nginx/luajit/lib")),
            ..syntax()
        };
        ConfigValidator::new(dir.path(), syntax, &runner)
            .check_syntax()
            .expect("valid");
        let seen = runner.seen.borrow();
        assert_eq!(
            seen[0].0.env_value("LD_LIBRARY_PATH"),
            Some("/deps/0/nginx/luajit/lib")
        );
    }

    #[test]
    fn rejected_syntax_carries_stderr() {
        let dir = build_dir(Some(GOOD));
        let runner = FakeRunner {
            exit_code: 1,
            stderr: "nginx: [emerg] unexpected \"}\"".into(),
            ..FakeRunner::default()
        };
        let err = ConfigValidator::new(dir.path(), syntax(), &runner)
            .validate()
            .expect_err("should fail");
        assert!(err.to_string().starts_with("nginx.conf contains syntax errors"));
        match err {
            StageError::SyntaxCheck { stderr, .. } => assert!(stderr.contains("[emerg]")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn port_check_is_repeatable() {
        let dir = build_dir(Some(GOOD));
        let config = dir.path().join(NGINX_CONF);
        check_port_placeholder(&config).expect("first");
        check_port_placeholder(&config).expect("second");
    }

    #[test]
    fn access_logging_detection() {
        assert!(access_logging_enabled("access_log /dev/stdout;"));
        assert!(!access_logging_enabled("events {}"));
        assert!(!access_logging_enabled("access_log off;"));
        assert!(!access_logging_enabled("ACCESS_LOG   OFF;"));
    }

    #[test]
    fn disabled_access_logging_is_not_fatal() {
        let dir = build_dir(Some("events {}\nhttp { server { listen {{port}}; } }\n"));
        let runner = FakeRunner::default();
        let outcome = ConfigValidator::new(dir.path(), syntax(), &runner)
            .validate()
            .expect("advisory only");
        assert!(!outcome.access_logging_enabled);
    }

    #[test]
    fn syntax_check_leaves_absolutely_included_files_untouched() {
        let dir = build_dir(None);
        let extra = dir.path().join("extra.conf");
        std::fs::write(&extra, "server { listen {{port}}; }\n").expect("write");
        let outside = tempfile::tempdir().expect("tempdir");
        let foreign = outside.path().join("foreign.conf");
        std::fs::write(&foreign, "server { listen {{port}}; }\n").expect("write");
        std::fs::write(
            dir.path().join(NGINX_CONF),
            format!(
                "events {{}}\nhttp {{ include {}; include {}; }}\n",
                extra.display(),
                foreign.display()
            ),
        )
        .expect("write");

        let runner = FakeRunner::default();
        ConfigValidator::new(dir.path(), syntax(), &runner)
            .check_syntax()
            .expect("valid");

        assert_eq!(
            std::fs::read_to_string(&extra).expect("read"),
            "server { listen {{port}}; }\n"
        );
        assert_eq!(
            std::fs::read_to_string(&foreign).expect("read"),
            "server { listen {{port}}; }\n"
        );
        assert_eq!(runner.seen.borrow().len(), 1);
    }
}

//! Directive functions and the context they read from.
//!
//! A [`DirectiveSet`] decides, for each directive, whether it expands to
//! text or is preserved for a later stage. [`RenderContext`] holds every
//! piece of ambient state the real functions need (assigned port,
//! environment snapshot, plaintext allow-list, module directories, and
//! nameservers); [`PortProbe`] is the dry-run set used to prove that a
//! configuration interpolates the port.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use ngstage_common::constants::PORT_NONCE_LENGTH;
use ngstage_common::error::{Result, StageError};
use rand::Rng;
use rand::distr::Alphanumeric;

use crate::parser::Directive;

/// Result of expanding one directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// Replace the directive with this text.
    Text(String),
    /// Keep the directive verbatim for a later stage.
    Preserve,
}

/// A set of directive functions applied by one expansion stage.
pub trait DirectiveSet {
    /// Expands a single directive.
    ///
    /// # Errors
    ///
    /// Returns an error if the directive is called with the wrong number of
    /// arguments or its function fails.
    fn expand(&self, directive: &Directive) -> Result<Expansion>;
}

/// Local and global directories searched by `{{module "name"}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModulePaths {
    /// Operator-supplied modules; wins when `<local>/<name>.so` exists.
    pub local: PathBuf,
    /// Modules shipped with the installed server binary.
    pub global: PathBuf,
}

impl ModulePaths {
    /// Creates module search paths.
    #[must_use]
    pub fn new(local: impl Into<PathBuf>, global: impl Into<PathBuf>) -> Self {
        Self {
            local: local.into(),
            global: global.into(),
        }
    }

    /// Builds the `load_module` statement for a module name.
    ///
    /// # Errors
    ///
    /// Returns an error if the local module directory cannot be inspected.
    pub fn load_directive(&self, name: &str) -> Result<String> {
        let file = format!("{name}.so");
        let local = self.local.join(&file);
        let found_locally = local.try_exists().map_err(|e| StageError::Io {
            path: local.clone(),
            source: e,
        })?;
        let dir = if found_locally { &self.local } else { &self.global };
        tracing::debug!(module = name, dir = %dir.display(), local = found_locally, "resolved module");
        Ok(format!("load_module {};", dir.join(file).display()))
    }
}

/// Ambient state for the real directive functions.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    port: String,
    env: BTreeMap<String, String>,
    plaintext: BTreeSet<String>,
    modules: ModulePaths,
    nameservers: Vec<String>,
}

impl RenderContext {
    /// Creates a context for the given listen port.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    /// Sets the environment snapshot `{{env}}` reads from.
    #[must_use]
    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = env.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Sets the variables substituted without escaping.
    #[must_use]
    pub fn with_plaintext_env<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plaintext = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the module search paths.
    #[must_use]
    pub fn with_modules(mut self, modules: ModulePaths) -> Self {
        self.modules = modules;
        self
    }

    /// Sets the nameservers joined by `{{nameservers}}`.
    #[must_use]
    pub fn with_nameservers(mut self, nameservers: Vec<String>) -> Self {
        self.nameservers = nameservers;
        self
    }

    /// Returns the stage that substitutes only allow-listed variables.
    #[must_use]
    pub const fn plaintext_stage(&self) -> PlaintextEnv<'_> {
        PlaintextEnv { context: self }
    }

    fn env_value(&self, name: &str) -> &str {
        self.env.get(name).map_or("", String::as_str)
    }

    fn is_plaintext(&self, name: &str) -> bool {
        self.plaintext.contains(name)
    }
}

impl DirectiveSet for RenderContext {
    fn expand(&self, directive: &Directive) -> Result<Expansion> {
        let text = match directive.name.as_str() {
            "port" => {
                expect_args(directive, 0)?;
                self.port.clone()
            }
            "env" => {
                let name = single_arg(directive)?;
                let value = self.env_value(name);
                if self.is_plaintext(name) {
                    value.to_string()
                } else {
                    escape_html(value)
                }
            }
            "module" => self.modules.load_directive(single_arg(directive)?)?,
            "nameservers" => {
                expect_args(directive, 0)?;
                self.nameservers.join(" ")
            }
            unknown => {
                tracing::debug!(name = unknown, line = directive.line, "unknown directive expands to nothing");
                String::new()
            }
        };
        Ok(Expansion::Text(text))
    }
}

/// First expansion stage: allow-listed `{{env}}` directives only.
///
/// Every other directive, including `env` for a variable that is not
/// allow-listed, is preserved verbatim for the final stage.
#[derive(Debug, Clone, Copy)]
pub struct PlaintextEnv<'a> {
    context: &'a RenderContext,
}

impl DirectiveSet for PlaintextEnv<'_> {
    fn expand(&self, directive: &Directive) -> Result<Expansion> {
        if directive.name != "env" {
            return Ok(Expansion::Preserve);
        }
        let name = single_arg(directive)?;
        if self.context.is_plaintext(name) {
            Ok(Expansion::Text(self.context.env_value(name).to_string()))
        } else {
            Ok(Expansion::Preserve)
        }
    }
}

/// Dry-run set: `{{port}}` yields a random marker, everything else nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortProbe {
    nonce: String,
}

impl PortProbe {
    /// Creates a probe with a fresh random alphanumeric marker.
    #[must_use]
    pub fn random() -> Self {
        let nonce = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(PORT_NONCE_LENGTH)
            .map(char::from)
            .collect();
        Self { nonce }
    }

    /// Returns the marker substituted for `{{port}}`.
    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Whether expanded text contains the marker.
    #[must_use]
    pub fn found_in(&self, expanded: &str) -> bool {
        expanded.contains(&self.nonce)
    }
}

impl DirectiveSet for PortProbe {
    fn expand(&self, directive: &Directive) -> Result<Expansion> {
        let text = if directive.name == "port" {
            self.nonce.clone()
        } else {
            String::new()
        };
        Ok(Expansion::Text(text))
    }
}

fn expect_args(directive: &Directive, want: usize) -> Result<()> {
    if directive.args.len() == want {
        Ok(())
    } else {
        Err(StageError::Template {
            path: None,
            line: directive.line,
            message: format!(
                "wrong number of args for {}: want {want} got {}",
                directive.name,
                directive.args.len()
            ),
        })
    }
}

fn single_arg(directive: &Directive) -> Result<&str> {
    expect_args(directive, 1)?;
    Ok(directive.args.first().map_or("", String::as_str))
}

/// Escapes a value for the non-allow-listed `{{env}}` path.
///
/// Matches the escaping applied by HTML-aware template engines: `&`, `<`,
/// `>`, `"`, `'`, `+` become entities and NUL becomes U+FFFD.
#[must_use]
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            '+' => out.push_str("&#43;"),
            '\0' => out.push('\u{FFFD}'),
            other => out.push(other),
        }
    }
    out
}

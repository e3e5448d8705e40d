//! Two-stage expansion of configuration text and files.
//!
//! The plaintext stage substitutes allow-listed `{{env}}` values and keeps
//! every other directive; the final stage resolves what remains. When a file
//! is expanded, the `include` statements in its literal text are followed and
//! each included file is expanded in place as well.

use std::collections::{BTreeSet, VecDeque};
use std::path::{Component, Path, PathBuf};

use ngstage_common::error::{Result, StageError};

use crate::directives::{DirectiveSet, RenderContext};
use crate::parser::Template;

/// Expands text with a single directive set.
///
/// # Errors
///
/// Returns a template error if the text cannot be parsed or a directive
/// fails to expand.
pub fn expand(text: &str, set: &dyn DirectiveSet) -> Result<String> {
    Ok(Template::parse(text)?.apply(set)?.render())
}

/// Directory tree that [`TemplateEngine::expand_file`] may rewrite.
///
/// Include targets under `origin` are redirected to the same relative path
/// under `root`. Anything still outside `root` is left alone.
#[derive(Debug, Clone)]
pub struct Confinement {
    root: PathBuf,
    origin: Option<PathBuf>,
}

impl Confinement {
    /// Confines rewrites to `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            origin: None,
        }
    }

    /// Redirects paths under `origin`, the tree `root` was copied from.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Normalizes `path` and moves it from `origin` into `root`.
    fn map(&self, path: &Path) -> PathBuf {
        let path = normalize(path);
        self.origin
            .as_deref()
            .and_then(|origin| path.strip_prefix(normalize(origin)).ok())
            .map_or_else(|| path.clone(), |rel| self.root.join(rel))
    }

    /// Whether `path`, with symlinks resolved when it exists, lies in `root`.
    fn contains(&self, path: &Path) -> bool {
        match (path.canonicalize(), self.root.canonicalize()) {
            (Ok(path), Ok(root)) => path.starts_with(root),
            _ => normalize(path).starts_with(normalize(&self.root)),
        }
    }
}

/// Resolves `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Expands configuration text and files against a [`RenderContext`].
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    context: RenderContext,
    confinement: Option<Confinement>,
}

impl TemplateEngine {
    /// Creates an engine over the given context.
    #[must_use]
    pub const fn new(context: RenderContext) -> Self {
        Self {
            context,
            confinement: None,
        }
    }

    /// Restricts which included files [`Self::expand_file`] rewrites.
    #[must_use]
    pub fn with_confinement(mut self, confinement: Confinement) -> Self {
        self.confinement = Some(confinement);
        self
    }

    /// Runs the plaintext stage then the final stage.
    ///
    /// # Errors
    ///
    /// Returns a template error on malformed input or wrong arity.
    pub fn expand(&self, text: &str) -> Result<String> {
        Ok(self.expand_template(Template::parse(text)?)?.render())
    }

    fn expand_template(&self, template: Template) -> Result<Template> {
        template
            .apply(&self.context.plaintext_stage())?
            .apply(&self.context)
    }

    /// Expands `path` in place and then every file it includes.
    ///
    /// Relative include paths are resolved against `include_root`. Includes
    /// are read from the literal text before expansion, so substituted values
    /// never add include targets. Returns the files rewritten, top-level file
    /// first.
    ///
    /// # Errors
    ///
    /// Returns `StageError::ConfigUnreadable` if `path` cannot be read,
    /// `StageError::IncludeUnreadable` if an included file cannot be read,
    /// or a template error naming the file that failed to parse.
    pub fn expand_file(&self, path: &Path, include_root: &Path) -> Result<Vec<PathBuf>> {
        let text = std::fs::read_to_string(path).map_err(|e| StageError::ConfigUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut visited = BTreeSet::from([path.to_path_buf()]);
        let mut rewritten = Vec::new();
        let mut pending = VecDeque::from([(path.to_path_buf(), text)]);

        while let Some((file, text)) = pending.pop_front() {
            let template = Template::parse(&text).map_err(|e| e.with_template_path(&file))?;
            let includes = include_targets(&template.literal_text());
            let expanded = self
                .expand_template(template)
                .map_err(|e| e.with_template_path(&file))?
                .render();
            write_file(&file, &expanded)?;
            tracing::debug!(file = %file.display(), "expanded config file");
            rewritten.push(file.clone());

            for pattern in includes {
                for target in self.resolve_include(&pattern, include_root, &file)? {
                    if !visited.insert(target.clone()) {
                        continue;
                    }
                    let text = std::fs::read_to_string(&target).map_err(|e| {
                        StageError::IncludeUnreadable {
                            config: file.clone(),
                            include: PathBuf::from(&pattern),
                            source: e,
                        }
                    })?;
                    pending.push_back((target, text));
                }
            }
        }

        Ok(rewritten)
    }

    /// Resolves one include target to the files it names.
    ///
    /// Plain paths name exactly one file, which may not exist; glob patterns
    /// name every existing match, possibly none. Under a confinement, targets
    /// outside its root are dropped.
    fn resolve_include(&self, pattern: &str, include_root: &Path, config: &Path) -> Result<Vec<PathBuf>> {
        let mut full = include_root.join(pattern);
        if let Some(confinement) = &self.confinement {
            full = confinement.map(&full);
        }

        let targets = if pattern.contains(['*', '?', '[']) {
            glob_include(pattern, &full, config)?
        } else {
            vec![full]
        };

        let Some(confinement) = &self.confinement else {
            return Ok(targets);
        };
        Ok(targets
            .into_iter()
            .filter(|target| {
                let inside = confinement.contains(target);
                if !inside {
                    tracing::debug!(
                        include = pattern,
                        target = %target.display(),
                        "include outside the expansion root, not rewritten"
                    );
                }
                inside
            })
            .collect())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).map_err(|e| StageError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Extracts the targets of `include` statements from nginx configuration.
///
/// This is a statement scanner, not a grammar: comments are stripped per
/// line, statements are split on `;`, and a statement counts when the text
/// after its last block brace starts with the `include` keyword.
#[must_use]
pub fn include_targets(config: &str) -> Vec<String> {
    let uncommented: String = config
        .lines()
        .map(|line| line.split_once('#').map_or(line, |(code, _)| code))
        .collect::<Vec<_>>()
        .join("\n");

    uncommented
        .split(';')
        .filter_map(|statement| {
            let statement = statement
                .rsplit(['{', '}'])
                .next()
                .unwrap_or(statement)
                .trim();
            let rest = statement.strip_prefix("include")?;
            if !rest.starts_with(char::is_whitespace) {
                return None;
            }
            let target = rest.trim().trim_matches(['"', '\'']);
            (!target.is_empty()).then(|| target.to_string())
        })
        .collect()
}

fn glob_include(pattern: &str, full: &Path, config: &Path) -> Result<Vec<PathBuf>> {
    let mut matches = glob::glob(&full.to_string_lossy())
        .map_err(|e| StageError::Template {
            path: Some(config.to_path_buf()),
            line: 0,
            message: format!("invalid include pattern {pattern}: {e}"),
        })?
        .filter_map(std::result::Result::ok)
        .filter(|p| p.is_file())
        .collect::<Vec<_>>();
    matches.sort();
    if matches.is_empty() {
        tracing::debug!(pattern, "include pattern matched no files");
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::{ModulePaths, PortProbe};

    fn engine() -> TemplateEngine {
        TemplateEngine::new(
            RenderContext::new("8080")
                .with_env([("FOO", "BAR"), ("JSON", r#"{"abcd":1234}"#)])
                .with_plaintext_env(["JSON"]),
        )
    }

    #[test]
    fn expand_substitutes_port() {
        let out = engine().expand("Hi the port is {{port}}.").expect("expand");
        assert_eq!(out, "Hi the port is 8080.");
    }

    #[test]
    fn expand_handles_both_env_stages() {
        let out = engine()
            .expand(r#"a={{env "FOO"}} b={{env "JSON"}}"#)
            .expect("expand");
        assert_eq!(out, r#"a=BAR b={"abcd":1234}"#);
    }

    #[test]
    fn plaintext_values_are_not_reparsed() {
        let engine = TemplateEngine::new(
            RenderContext::new("8080")
                .with_env([("TRICK", "{{port}}")])
                .with_plaintext_env(["TRICK"]),
        );
        assert_eq!(engine.expand(r#"{{env "TRICK"}}"#).expect("expand"), "{{port}}");
    }

    #[test]
    fn plaintext_stage_keeps_other_directives() {
        let context = RenderContext::new("8080")
            .with_env([("FOO", "BAR"), ("JSON", r#"{"abcd":1234}"#)])
            .with_plaintext_env(["JSON"]);
        let out = expand(r#"{{port}} {{env "FOO"}} {{env "JSON"}}"#, &context.plaintext_stage())
            .expect("expand");
        assert_eq!(out, r#"{{port}} {{env "FOO"}} {"abcd":1234}"#);
    }

    #[test]
    fn literal_text_round_trips() {
        let text = "events {}\nhttp { server { listen 80; } }\n";
        assert_eq!(engine().expand(text).expect("expand"), text);
    }

    #[test]
    fn port_probe_check_is_idempotent() {
        let probe = PortProbe::random();
        let text = "listen {{port}};";
        let first = expand(text, &probe).expect("expand");
        let second = expand(text, &probe).expect("expand");
        assert_eq!(first, second);
        assert!(probe.found_in(&first));
        assert!(!probe.found_in(&expand("listen 80;", &probe).expect("expand")));
    }

    #[test]
    fn include_targets_are_extracted() {
        let config = "\
worker_processes 1; # include nope.conf;
http {
  include mime.types;
  server { include \"conf.d/*.conf\"; listen 80; }
  # include commented.conf;
  includes_not_a_directive x;
}
";
        assert_eq!(include_targets(config), vec!["mime.types", "conf.d/*.conf"]);
    }

    #[test]
    fn expand_file_rewrites_config_and_includes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conf = dir.path().join("nginx.conf");
        std::fs::write(&conf, "listen {{port}};\ninclude custom.conf;\n").expect("write");
        std::fs::write(
            dir.path().join("custom.conf"),
            r#"add_header X-Foo {{env "FOO"}};"#,
        )
        .expect("write");

        let files = engine().expand_file(&conf, dir.path()).expect("expand");
        assert_eq!(files.len(), 2);
        assert_eq!(
            std::fs::read_to_string(&conf).expect("read"),
            "listen 8080;\ninclude custom.conf;\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("custom.conf")).expect("read"),
            "add_header X-Foo BAR;"
        );
    }

    #[test]
    fn expand_file_visits_each_include_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conf = dir.path().join("nginx.conf");
        std::fs::write(&conf, "include a.conf;\ninclude a.conf;\n").expect("write");
        std::fs::write(dir.path().join("a.conf"), "include nginx.conf;\n").expect("write");

        let files = engine().expand_file(&conf, dir.path()).expect("expand");
        assert_eq!(files, vec![conf, dir.path().join("a.conf")]);
    }

    #[test]
    fn expand_file_follows_glob_includes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let confd = dir.path().join("conf.d");
        std::fs::create_dir_all(&confd).expect("mkdir");
        std::fs::write(confd.join("one.conf"), "# {{port}}").expect("write");
        std::fs::write(confd.join("two.conf"), "# {{port}}").expect("write");
        let conf = dir.path().join("nginx.conf");
        std::fs::write(&conf, "include conf.d/*.conf;\ninclude empty/*.conf;\n").expect("write");

        let files = engine().expand_file(&conf, dir.path()).expect("expand");
        assert_eq!(files.len(), 3);
        assert_eq!(
            std::fs::read_to_string(confd.join("two.conf")).expect("read"),
            "# 8080"
        );
    }

    #[test]
    fn missing_include_names_config_and_include() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conf = dir.path().join("nginx.conf");
        std::fs::write(&conf, "include missing.conf;\n").expect("write");

        let err = engine().expand_file(&conf, dir.path()).expect_err("should fail");
        match &err {
            StageError::IncludeUnreadable { config, include, .. } => {
                assert_eq!(config, &conf);
                assert_eq!(include, Path::new("missing.conf"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with("could not read config file: "));
    }

    #[test]
    fn missing_config_is_unreadable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = engine()
            .expand_file(&dir.path().join("nginx.conf"), dir.path())
            .expect_err("should fail");
        assert!(matches!(err, StageError::ConfigUnreadable { .. }));
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conf = dir.path().join("nginx.conf");
        std::fs::write(&conf, "listen {{port;\n").expect("write");

        let err = engine().expand_file(&conf, dir.path()).expect_err("should fail");
        let message = err.to_string();
        assert!(message.contains("nginx.conf"), "{message}");
        assert!(message.contains("line 1"), "{message}");
    }

    #[test]
    fn module_directive_through_engine() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = TemplateEngine::new(
            RenderContext::new("8080").with_modules(ModulePaths::new(dir.path(), "/global")),
        );
        assert_eq!(
            engine.expand(r#"{{module "ngx_stream_module"}}"#).expect("expand"),
            "load_module /global/ngx_stream_module.so;"
        );
    }

    #[test]
    fn substituted_values_do_not_add_includes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outside = tempfile::tempdir().expect("tempdir");
        let victim = outside.path().join("victim.conf");
        std::fs::write(&victim, "listen {{port}};").expect("write");
        let conf = dir.path().join("nginx.conf");
        std::fs::write(&conf, r#"{{env "INJECT"}}"#).expect("write");

        let engine = TemplateEngine::new(
            RenderContext::new("8080")
                .with_env([("INJECT", format!("include {};", victim.display()))])
                .with_plaintext_env(["INJECT"]),
        );
        let files = engine.expand_file(&conf, dir.path()).expect("expand");
        assert_eq!(files, vec![conf]);
        assert_eq!(std::fs::read_to_string(&victim).expect("read"), "listen {{port}};");
    }

    #[test]
    fn confinement_redirects_origin_and_skips_outside() {
        let origin = tempfile::tempdir().expect("tempdir");
        let copy = tempfile::tempdir().expect("tempdir");
        let outside = tempfile::tempdir().expect("tempdir");
        for dir in [origin.path(), copy.path()] {
            std::fs::write(dir.join("extra.conf"), "listen {{port}};").expect("write");
        }
        let foreign = outside.path().join("foreign.conf");
        std::fs::write(&foreign, "listen {{port}};").expect("write");
        let conf = copy.path().join("nginx.conf");
        std::fs::write(
            &conf,
            format!(
                "include {};\ninclude {};\ninclude ../{}/x.conf;\n",
                origin.path().join("extra.conf").display(),
                foreign.display(),
                outside.path().file_name().expect("name").to_string_lossy(),
            ),
        )
        .expect("write");

        let engine = engine().with_confinement(Confinement::new(copy.path()).with_origin(origin.path()));
        let files = engine.expand_file(&conf, copy.path()).expect("expand");
        assert_eq!(files, vec![conf, copy.path().join("extra.conf")]);
        assert_eq!(
            std::fs::read_to_string(copy.path().join("extra.conf")).expect("read"),
            "listen 8080;"
        );
        assert_eq!(
            std::fs::read_to_string(origin.path().join("extra.conf")).expect("read"),
            "listen {{port}};"
        );
        assert_eq!(std::fs::read_to_string(&foreign).expect("read"), "listen {{port}};");
    }

    #[test]
    fn normalize_resolves_dot_components() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
    }
}

//! # ngstage-template
//!
//! Expansion of the `{{ name "arg" }}` directive language embedded in nginx
//! configuration files.
//!
//! Handles:
//! - **Parser**: Splitting text into literal and directive segments.
//! - **Directives**: The `port`, `env`, `module`, and `nameservers` functions
//!   and the context object they read from.
//! - **Engine**: The two-stage expansion pipeline and in-place file rewriting,
//!   following nginx `include` statements.
//! - **Nameservers**: Reading resolver configuration for `{{nameservers}}`.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod directives;
pub mod engine;
pub mod nameservers;
pub mod parser;

pub use directives::{DirectiveSet, Expansion, ModulePaths, PortProbe, RenderContext};
pub use engine::{Confinement, TemplateEngine, expand};
pub use parser::{Directive, Segment, Template};

//! Directive parser built on `nom`.
//!
//! Splits configuration text into literal and directive segments. The
//! resulting [`Template`] is the unit the expansion stages operate on: each
//! stage replaces the directives it resolves with literal segments and keeps
//! the rest, so substituted values are never parsed a second time.

pub mod lexer;

use ngstage_common::error::{Result, StageError};

use self::lexer::{CLOSE, OPEN};

/// A `{{ name "arg" ... }}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Function name, e.g. `port` or `env`.
    pub name: String,
    /// Literal string arguments in order.
    pub args: Vec<String>,
    /// Exact source text of the directive, re-emitted when it is preserved.
    pub raw: String,
    /// 1-based line on which the directive starts.
    pub line: usize,
}

/// One piece of a parsed configuration text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied to the output unchanged.
    Literal(String),
    /// A directive awaiting expansion.
    Directive(Directive),
}

/// A parsed configuration text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parses configuration text into segments.
    ///
    /// Comments (`{{/* ... */}}`) are dropped and trim markers are applied to
    /// the neighbouring literal text during parsing.
    ///
    /// # Errors
    ///
    /// Returns `StageError::Template` for an unterminated or malformed
    /// directive.
    pub fn parse(text: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = text;
        let mut trim_next = false;

        while !rest.is_empty() {
            let (literal, tail) = rest
                .find(OPEN)
                .map_or((rest, ""), |idx| rest.split_at(idx));
            let mut literal = if trim_next { literal.trim_start() } else { literal };
            trim_next = false;

            if tail.is_empty() {
                push_literal(&mut segments, literal);
                break;
            }

            let line = line_at(text, text.len() - tail.len());
            let (after, body) =
                lexer::directive(tail).map_err(|_| directive_error(tail, line))?;

            if body.trim_left {
                literal = literal.trim_end();
            }
            push_literal(&mut segments, literal);

            if let Some(call) = body.call {
                segments.push(Segment::Directive(Directive {
                    name: call.name,
                    args: call.args,
                    raw: tail[..tail.len() - after.len()].to_string(),
                    line,
                }));
            }
            trim_next = body.trim_right;
            rest = after;
        }

        Ok(Self { segments })
    }

    /// Returns the segments in source order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Iterates over the directives still awaiting expansion.
    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Directive(d) => Some(d),
            Segment::Literal(_) => None,
        })
    }

    /// Runs one expansion stage over the template.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by the directive set.
    pub fn apply<D: crate::directives::DirectiveSet + ?Sized>(self, set: &D) -> Result<Self> {
        let segments = self
            .segments
            .into_iter()
            .map(|segment| match segment {
                Segment::Directive(d) => Ok(match set.expand(&d)? {
                    crate::directives::Expansion::Text(text) => Segment::Literal(text),
                    crate::directives::Expansion::Preserve => Segment::Directive(d),
                }),
                literal @ Segment::Literal(_) => Ok(literal),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { segments })
    }

    /// Concatenates the literal text, leaving out every directive.
    #[must_use]
    pub fn literal_text(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Literal(text) => Some(text.as_str()),
                Segment::Directive(_) => None,
            })
            .collect()
    }

    /// Serializes the template, re-emitting preserved directives verbatim.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Directive(d) => out.push_str(&d.raw),
            }
        }
        out
    }
}

fn push_literal(segments: &mut Vec<Segment>, literal: &str) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal.to_string()));
    }
}

fn line_at(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

fn directive_error(tail: &str, line: usize) -> StageError {
    let message = tail.find(CLOSE).map_or_else(
        || "unterminated directive: missing `}}`".to_string(),
        |end| {
            let snippet: String = tail[..end + CLOSE.len()].chars().take(60).collect();
            format!("malformed directive `{snippet}`")
        },
    );
    StageError::Template {
        path: None,
        line,
        message,
    }
}

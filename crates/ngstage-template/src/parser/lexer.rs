//! Tokenization of a single `{{ ... }}` directive using `nom`.
//!
//! Recognises a function call (`name` followed by zero or more quoted
//! arguments), a comment (`/* ... */`), and the `{{-` / `-}}` whitespace
//! trim markers. Literal text outside the braces is never seen here.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{map, opt, peek, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
};

/// A function call inside a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub(crate) name: String,
    pub(crate) args: Vec<String>,
}

/// The parsed contents of one `{{ ... }}` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DirectiveBody {
    /// `None` for a comment.
    pub(crate) call: Option<Call>,
    /// `{{-` trims trailing whitespace of the preceding text.
    pub(crate) trim_left: bool,
    /// `-}}` trims leading whitespace of the following text.
    pub(crate) trim_right: bool,
}

/// Opening delimiter of a directive.
pub(crate) const OPEN: &str = "{{";

/// Closing delimiter of a directive.
pub(crate) const CLOSE: &str = "}}";

fn open(input: &str) -> IResult<&str, bool> {
    let (input, _) = tag(OPEN).parse(input)?;
    let (input, trim) = opt(terminated(char('-'), peek(multispace1))).parse(input)?;
    Ok((input, trim.is_some()))
}

fn close(input: &str) -> IResult<&str, bool> {
    preceded(
        multispace0,
        alt((value(true, tag("-}}")), value(false, tag(CLOSE)))),
    )
    .parse(input)
}

fn comment(input: &str) -> IResult<&str, &str> {
    delimited(tag("/*"), take_until("*/"), tag("*/")).parse(input)
}

const fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '.'
}

const fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(take_while1(is_ident_start), take_while(is_ident_continue))).parse(input)
}

/// Parses a double-quoted string literal with basic escape support.
fn string_literal(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"').parse(input)?;
    let mut result = String::new();
    let mut chars = input.char_indices();
    loop {
        match chars.next() {
            Some((idx, '"')) => {
                let remaining = &input[idx + 1..];
                return Ok((remaining, result));
            }
            Some((_, '\\')) => match chars.next() {
                Some((_, 'n')) => result.push('\n'),
                Some((_, 't')) => result.push('\t'),
                Some((_, '\\')) => result.push('\\'),
                Some((_, '"')) => result.push('"'),
                Some((_, c)) => {
                    result.push('\\');
                    result.push(c);
                }
                None => {
                    return Err(nom::Err::Failure(nom::error::Error::new(
                        input,
                        nom::error::ErrorKind::Char,
                    )));
                }
            },
            Some((_, '\n')) | None => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Char,
                )));
            }
            Some((_, c)) => result.push(c),
        }
    }
}

/// Parses a backtick-delimited raw string (no escapes).
fn raw_string(input: &str) -> IResult<&str, String> {
    map(delimited(char('`'), take_until("`"), char('`')), str::to_string).parse(input)
}

fn argument(input: &str) -> IResult<&str, String> {
    preceded(multispace1, alt((string_literal, raw_string))).parse(input)
}

fn call(input: &str) -> IResult<&str, Call> {
    map(pair(identifier, many0(argument)), |(name, args)| Call {
        name: name.to_string(),
        args,
    })
    .parse(input)
}

/// Parses one directive starting at its opening `{{`.
pub(crate) fn directive(input: &str) -> IResult<&str, DirectiveBody> {
    let (input, trim_left) = open(input)?;
    let (input, _) = multispace0(input)?;
    let (input, call) = alt((value(None, comment), map(call, Some))).parse(input)?;
    let (input, trim_right) = close(input)?;
    Ok((
        input,
        DirectiveBody {
            call,
            trim_left,
            trim_right,
        },
    ))
}

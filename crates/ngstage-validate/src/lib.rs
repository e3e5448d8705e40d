//! # ngstage-validate
//!
//! Checks an application's `nginx.conf` before the server is allowed to run.
//!
//! Handles:
//! - **Validator**: Presence, port-placeholder dry run, isolated syntax check,
//!   and the access-logging advisory.
//! - **Command**: Running external programs with an explicit environment.
//! - **Copy**: Duplicating the build directory into a scratch location.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod command;
pub mod copy;
pub mod validator;

pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use validator::{ConfigValidator, SyntaxCheck, ValidationOutcome};

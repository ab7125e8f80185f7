//! A small two-stage shell.
//!
//! Each input line is split on spaces, parsed into at most two commands joined by
//! a pipe, each with optional `<`, `>` and `>>` redirections, and run as child
//! processes wired together with an OS pipe. The shell waits for every child and
//! reports how it ended. `printenv` and `setenv` run inside the shell and work on
//! the session [`env::Environment`], which is what every child receives.
//!
//! The main entry point is [`Interpreter`]. The public modules expose the parser
//! and the executor for use without the interactive loop.

mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
mod external;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod pipeline;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Interpreter, LineOutcome};

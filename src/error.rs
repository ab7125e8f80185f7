use std::ffi::NulError;
use std::io;

use nix::errno::Errno;
use thiserror::Error;

/// Problems found while classifying the tokens of a line.
///
/// A syntax error abandons the whole line before any process is created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("Syntax error: missing input file.")]
    MissingInputFile,
    #[error("{}", if *append { "Syntax error: missing file for appending." } else { "Syntax error: missing output file." })]
    MissingOutputFile { append: bool },
    #[error("No command entered")]
    NoCommand,
    #[error("Syntax error: missing command after pipe")]
    MissingCommandAfterPipe,
    /// `stage` is 1 for the command before the pipe and 2 for the one after it.
    #[error("Too many arguments (max {max}) for cmd{stage}")]
    TooManyArguments { max: usize, stage: usize },
    #[error("Syntax error: only one pipe is supported")]
    MultiplePipes,
}

/// The operating system refused to give us a pipe or a process.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("pipe failed: {0}")]
    Pipe(#[source] Errno),
    #[error("fork failed for {program}: {source}")]
    Fork {
        program: String,
        #[source]
        source: Errno,
    },
}

/// Malformed input to the environment builtins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentError {
    #[error("Usage: setenv NAME=VALUE")]
    MissingAssignment,
    #[error("Usage: setenv NAME=VALUE")]
    MalformedAssignment(String),
    #[error("setenv: variable name must not be empty")]
    EmptyName,
}

/// Everything that can stop a line from running, seen from the parent shell.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("argument contains an interior NUL byte")]
    InteriorNul(#[from] NulError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{name}: {cause:#}")]
    Builtin { name: String, cause: anyhow::Error },
}

use crate::parser::DEFAULT_MAX_ARGS;
use std::path::PathBuf;

/// Greeting printed when an interactive session starts.
pub const BANNER: &[&str] = &[
    "--- pipesh: a small two-stage shell ---",
    "Type a command (e.g., ls -l /tmp). Type 'exit' to quit.",
    "WARNING: only the last redirection of each kind is honored per command.",
];

/// A line equal to this (ignoring surrounding spaces) ends the session.
pub const EXIT_SENTINEL: &str = "exit";

pub const FAREWELL: &str = "Exiting pipesh.";

/// Runtime options of a shell session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub prompt: String,
    /// Upper bound on `argv` length per command; `None` means unbounded.
    pub max_args: Option<usize>,
    /// Echo the tokenisation of every line before running it.
    pub show_tokens: bool,
    /// Print one line per waited child describing how it ended.
    pub report_status: bool,
    pub banner: bool,
    pub history_file: Option<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "pipesh> ".to_string(),
            max_args: Some(DEFAULT_MAX_ARGS),
            show_tokens: false,
            report_status: true,
            banner: true,
            history_file: None,
        }
    }
}

impl ShellConfig {
    /// No banner and no status reports, only what the commands themselves print.
    pub fn quiet(mut self) -> Self {
        self.banner = false;
        self.report_status = false;
        self
    }
}

use anyhow::{bail, Context};
use argh::FromArgs;
use log::LevelFilter;
use pipesh::config::ShellConfig;
use pipesh::env::Environment;
use pipesh::Interpreter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;
use std::path::PathBuf;

#[derive(FromArgs)]
/// A small interactive shell: one or two commands per line, joined by a pipe.
struct Args {
    /// prompt shown before every line
    #[argh(option)]
    prompt: Option<String>,

    /// maximum number of words per command (default 20)
    #[argh(option)]
    max_args: Option<usize>,

    /// do not limit the number of words per command
    #[argh(switch)]
    unlimited_args: bool,

    /// print the tokenisation of every line before running it
    #[argh(switch)]
    show_tokens: bool,

    /// no banner and no termination reports
    #[argh(switch, short = 'q')]
    quiet: bool,

    /// file to load line history from and save it to
    #[argh(option)]
    history: Option<PathBuf>,

    /// log level: off, error, warn, info, debug or trace
    #[argh(option, default = "LevelFilter::Warn")]
    log_level: LevelFilter,

    /// write log records to this file instead of standard error
    #[argh(option)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn shell_config(&self) -> anyhow::Result<ShellConfig> {
        let mut config = ShellConfig::default();
        match (self.max_args, self.unlimited_args) {
            (Some(_), true) => bail!("--max-args and --unlimited-args are mutually exclusive"),
            (Some(0), false) => bail!("--max-args must be at least 1"),
            (Some(max), false) => config.max_args = Some(max),
            (None, true) => config.max_args = None,
            (None, false) => {}
        }
        if let Some(prompt) = &self.prompt {
            config.prompt = prompt.clone();
        }
        config.show_tokens = self.show_tokens;
        config.history_file = self.history.clone();
        if self.quiet {
            config = config.quiet();
        }
        Ok(config)
    }
}

fn init_logging(level: LevelFilter, file: Option<&PathBuf>) -> anyhow::Result<()> {
    match file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            WriteLogger::init(level, Config::default(), file).context("failed to install logger")
        }
        None => TermLogger::init(
            level,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        )
        .context("failed to install logger"),
    }
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    init_logging(args.log_level, args.log_file.as_ref())?;

    let config = args.shell_config()?;
    log::debug!("starting with {:?}", config);
    Interpreter::new(config, Environment::from_host()).repl()
}

use crate::command::{CommandFactory, ExitCode};
use crate::config::{ShellConfig, BANNER, EXIT_SENTINEL, FAREWELL};
use crate::env::Environment;
use crate::error::ShellError;
use crate::lexer;
use crate::parser::{self, PipelinePlan};
use crate::pipeline::{self, ChildReport};
use anyhow::Context;
use log::{debug, info, warn};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate, i.e. builtins.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// What happened to a single input line.
#[derive(Debug, PartialEq, Eq)]
pub enum LineOutcome {
    /// The line asked to end the session.
    Exit,
    /// A builtin ran inside the shell process.
    Builtin(ExitCode),
    /// One report per child, in stage order.
    Pipeline(Vec<ChildReport>),
}

/// A minimal shell that runs one or two external programs per line.
///
/// The interpreter owns the session [`Environment`] and a list of builtin
/// [`CommandFactory`] objects that are queried before anything is forked.
///
/// Example
/// ```
/// use pipesh::{Interpreter, LineOutcome};
///
/// let mut sh = Interpreter::default();
/// let mut out = Vec::new();
/// let outcome = sh.execute_line("setenv GREETING=hello", &mut out).unwrap();
/// assert_eq!(outcome, LineOutcome::Builtin(0));
/// ```
pub struct Interpreter {
    env: Environment,
    config: ShellConfig,
    builtins: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create an interpreter with the default builtins, `printenv` and `setenv`.
    pub fn new(config: ShellConfig, env: Environment) -> Self {
        use crate::builtin::*;
        Self {
            env,
            config,
            builtins: vec![
                Box::new(Factory::<Printenv>::default()),
                Box::new(Factory::<Setenv>::default()),
            ],
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Run one input line.
    ///
    /// Builtin output, the optional token dump and the termination reports go to
    /// `out`. Spawned programs write to the shell's own standard streams unless
    /// redirected. Any error leaves the session usable for the next line.
    pub fn execute_line(&mut self, line: &str, out: &mut dyn Write) -> Result<LineOutcome, ShellError> {
        if line.trim_matches(lexer::DELIMITER) == EXIT_SENTINEL {
            return Ok(LineOutcome::Exit);
        }
        if self.config.show_tokens {
            dump_tokens(line, out)?;
        }

        let plan = parser::parse_line(line, self.config.max_args)?;
        for (stage, command) in plan.commands().enumerate() {
            debug!("stage {}: {:?}", stage + 1, command);
        }

        if let Some(code) = self.run_builtin(&plan, out)? {
            return Ok(LineOutcome::Builtin(code));
        }

        let reports = pipeline::execute(&plan, &self.env)?;
        let failed = reports.iter().filter(|r| !r.outcome.success()).count();
        if failed > 0 {
            info!("{} of {} commands did not succeed", failed, reports.len());
        }
        if self.config.report_status {
            for report in &reports {
                writeln!(out, "{}", report)?;
            }
        }
        Ok(LineOutcome::Pipeline(reports))
    }

    /// Builtins are looked up by the first command's name only. They run in
    /// process, so a pipe or a redirection on the line is ignored.
    fn run_builtin(&mut self, plan: &PipelinePlan, out: &mut dyn Write) -> Result<Option<ExitCode>, ShellError> {
        let command = &plan.first;
        let Some((name, args)) = command.argv.split_first() else {
            return Ok(None);
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let Some(builtin) = self.builtins.iter().find_map(|f| f.try_create(name, &args)) else {
            return Ok(None);
        };

        if command.has_redirection() || plan.is_piped() {
            info!("{}: builtin ignores redirections and pipes", name);
        }
        let code = builtin
            .execute(out, &mut self.env)
            .map_err(|cause| ShellError::Builtin {
                name: name.clone(),
                cause,
            })?;
        debug!("builtin {} returned {}", name, code);
        Ok(Some(code))
    }

    /// Read-Eval-Print Loop on the controlling terminal.
    ///
    /// Returns when the user types `exit` or closes the input.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new().context("failed to initialise the line editor")?;
        if let Some(path) = &self.config.history_file {
            if let Err(err) = rl.load_history(path) {
                debug!("no history loaded from {}: {}", path.display(), err);
            }
        }

        let mut stdout = std::io::stdout();
        if self.config.banner {
            for line in BANNER {
                writeln!(stdout, "{}", line)?;
            }
        }

        loop {
            match rl.readline(&self.config.prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    match self.execute_line(&line, &mut stdout) {
                        Ok(LineOutcome::Exit) => {
                            writeln!(stdout, "{}", FAREWELL)?;
                            break;
                        }
                        Ok(_) => {}
                        Err(err) => eprintln!("{}", err),
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => {
                    writeln!(stdout)?;
                    writeln!(stdout, "{}", FAREWELL)?;
                    break;
                }
                Err(err) => return Err(err).context("failed to read a line"),
            }
        }

        if let Some(path) = &self.config.history_file {
            if let Err(err) = rl.save_history(path) {
                warn!("could not save history to {}: {}", path.display(), err);
            }
        }
        Ok(())
    }
}

fn dump_tokens(line: &str, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Original line: \"{}\"", line)?;
    writeln!(out, "Tokenisation:")?;
    for (i, token) in lexer::split_into_tokens(line).enumerate() {
        writeln!(out, "\tToken {}: \"{}\"", i, token)?;
    }
    Ok(())
}

impl Default for Interpreter {
    /// Default options over a snapshot of the process environment.
    fn default() -> Self {
        Self::new(ShellConfig::default(), Environment::from_host())
    }
}

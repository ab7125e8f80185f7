use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::error::EnvironmentError;
use crate::interpreter::Factory;
use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use std::io::Write;
use std::os::unix::ffi::OsStrExt;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process. They never take part in a pipe
/// and never see redirections.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "printenv".
    fn name() -> &'static str;

    /// Executes the command using the shell's output and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self, stdout, env) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(stdout, "{}", e)?;
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        writeln!(stdout, "{}", self.output.trim_end())?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

#[derive(FromArgs)]
/// Print the whole environment, or the value of a single variable.
pub struct Printenv {
    #[argh(positional)]
    /// variable to print; prints every variable when omitted. Extra names are ignored.
    pub names: Vec<String>,
}

impl BuiltinCommand for Printenv {
    fn name() -> &'static str {
        "printenv"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        match self.names.first() {
            None => {
                for (key, value) in env.iter() {
                    write_assignment(stdout, key.as_bytes(), value.as_bytes())?;
                }
                Ok(0)
            }
            Some(name) => match env.get_var(name) {
                Some(value) => {
                    write_assignment(stdout, name.as_bytes(), value.as_bytes())?;
                    Ok(0)
                }
                None => {
                    writeln!(stdout, "{}: environment variable not found", name)?;
                    Ok(1)
                }
            },
        }
    }
}

fn write_assignment(stdout: &mut dyn Write, key: &[u8], value: &[u8]) -> std::io::Result<()> {
    stdout.write_all(key)?;
    stdout.write_all(b"=")?;
    stdout.write_all(value)?;
    stdout.write_all(b"\n")
}

#[derive(FromArgs)]
/// Set an environment variable for every command started afterwards.
pub struct Setenv {
    #[argh(positional)]
    /// assignment in the form NAME=VALUE; everything after the first '=' is the value.
    /// Only the first assignment is applied.
    pub assignments: Vec<String>,
}

impl Setenv {
    fn split_assignment(&self) -> Result<(&str, &str), EnvironmentError> {
        let assignment = self
            .assignments
            .first()
            .ok_or(EnvironmentError::MissingAssignment)?;
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| EnvironmentError::MalformedAssignment(assignment.to_string()))?;
        if name.is_empty() {
            return Err(EnvironmentError::EmptyName);
        }
        Ok((name, value))
    }
}

impl BuiltinCommand for Setenv {
    fn name() -> &'static str {
        "setenv"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let (name, value) = self.split_assignment()?;
        if self.assignments.len() > 1 {
            log::info!("setenv: ignoring {} extra argument(s)", self.assignments.len() - 1);
        }
        env.set_var(name, value);
        log::debug!("setenv {}", name);
        writeln!(stdout, "Environment variable '{}' set to '{}'.", name, value)?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    fn sample_env() -> Environment {
        [("HOME", "/home/user"), ("LANG", "C"), ("PIPESH_X", "a=b")]
            .into_iter()
            .collect()
    }

    fn run<T: BuiltinCommand + 'static>(args: &[&str], env: &mut Environment) -> (ExitCode, String) {
        let cmd = Factory::<T>::default()
            .try_create(T::name(), args)
            .expect("factory must accept its own name");
        let mut out = Vec::new();
        let code = cmd.execute(&mut out, env).unwrap();
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_factory_ignores_other_names() {
        assert!(Factory::<Printenv>::default().try_create("setenv", &[]).is_none());
        assert!(Factory::<Setenv>::default().try_create("env", &[]).is_none());
    }

    #[test]
    fn test_printenv_lists_everything_in_order() {
        let mut env = sample_env();
        let (code, out) = run::<Printenv>(&[], &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, "HOME=/home/user\nLANG=C\nPIPESH_X=a=b\n");
    }

    #[test]
    fn test_printenv_single_variable() {
        let mut env = sample_env();
        let (code, out) = run::<Printenv>(&["LANG"], &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, "LANG=C\n");
    }

    #[test]
    fn test_printenv_missing_variable() {
        let mut env = sample_env();
        let (code, out) = run::<Printenv>(&["NOPE"], &mut env);
        assert_eq!(code, 1);
        assert_eq!(out, "NOPE: environment variable not found\n");
    }

    #[test]
    fn test_printenv_uses_first_name_only() {
        let mut env = sample_env();
        let (code, out) = run::<Printenv>(&["LANG", "HOME"], &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, "LANG=C\n");
    }

    #[test]
    fn test_printenv_help_prints_usage() {
        let mut env = sample_env();
        let (code, out) = run::<Printenv>(&["--help"], &mut env);
        assert_eq!(code, 0);
        assert!(out.starts_with("Usage: printenv"), "{}", out);
    }

    #[test]
    fn test_setenv_creates_and_overwrites() {
        let mut env = sample_env();

        let (code, out) = run::<Setenv>(&["FOO=bar"], &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, "Environment variable 'FOO' set to 'bar'.\n");
        assert_eq!(env.get_var("FOO"), Some(OsStr::new("bar")));

        let (code, _) = run::<Setenv>(&["LANG=en_US.UTF-8"], &mut env);
        assert_eq!(code, 0);
        assert_eq!(env.get_var("LANG"), Some(OsStr::new("en_US.UTF-8")));
        assert_eq!(env.len(), 4);
    }

    #[test]
    fn test_setenv_applies_first_assignment_only() {
        let mut env = Environment::empty();
        let (code, out) = run::<Setenv>(&["A=1", "B=2"], &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, "Environment variable 'A' set to '1'.\n");
        assert_eq!(env.get_var("A"), Some(OsStr::new("1")));
        assert_eq!(env.get_var("B"), None);
    }

    #[test]
    fn test_setenv_splits_on_first_equals() {
        let mut env = Environment::empty();
        let (code, _) = run::<Setenv>(&["URL=a=b=c"], &mut env);
        assert_eq!(code, 0);
        assert_eq!(env.get_var("URL"), Some(OsStr::new("a=b=c")));
    }

    #[test]
    fn test_setenv_allows_empty_value() {
        let mut env = Environment::empty();
        let (code, _) = run::<Setenv>(&["EMPTY="], &mut env);
        assert_eq!(code, 0);
        assert_eq!(env.get_var("EMPTY"), Some(OsStr::new("")));
    }

    #[test]
    fn test_setenv_usage_errors() {
        let mut env = Environment::empty();

        let (code, out) = run::<Setenv>(&[], &mut env);
        assert_eq!(code, 1);
        assert_eq!(out, "Usage: setenv NAME=VALUE\n");

        let (code, out) = run::<Setenv>(&["NOEQUALS"], &mut env);
        assert_eq!(code, 1);
        assert_eq!(out, "Usage: setenv NAME=VALUE\n");

        let (code, _) = run::<Setenv>(&["=value"], &mut env);
        assert_eq!(code, 1);

        assert!(env.is_empty());
    }
}

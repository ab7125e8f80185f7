//! Process creation, descriptor wiring and termination reporting for one line.
//!
//! The parent is single-threaded and blocking: it forks every stage first, drops
//! its own pipe descriptors, and only then waits for each child in turn. Children
//! share nothing with the parent but the pipe.

use crate::env::Environment;
use crate::error::{ResourceError, ShellError};
use crate::external::{self, PreparedCommand, StdioWiring};
use crate::parser::PipelinePlan;
use log::{debug, error, trace, warn};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{self, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};
use std::ffi::CString;
use std::fmt;
use std::io::Write;
use std::os::fd::RawFd;

/// How a waited child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildOutcome {
    /// Normal exit with the given code.
    Exited(i32),
    /// Killed by the given signal number.
    Signaled(i32),
    /// Anything that cannot be classified as one of the above.
    Abnormal,
}

impl ChildOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ChildOutcome::Exited(0))
    }
}

impl From<WaitStatus> for ChildOutcome {
    fn from(status: WaitStatus) -> Self {
        match status {
            WaitStatus::Exited(_, code) => ChildOutcome::Exited(code),
            WaitStatus::Signaled(_, signal, _) => ChildOutcome::Signaled(signal as i32),
            _ => ChildOutcome::Abnormal,
        }
    }
}

/// One termination report per spawned child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildReport {
    pub pid: Pid,
    pub program: String,
    pub outcome: ChildOutcome,
}

impl fmt::Display for ChildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            ChildOutcome::Exited(code) => {
                write!(f, "Command '{}' exited with status {}", self.program, code)
            }
            ChildOutcome::Signaled(signal) => {
                write!(f, "Command '{}' terminated by signal: {}", self.program, signal)
            }
            ChildOutcome::Abnormal => write!(f, "Command '{}' terminated abnormally", self.program),
        }
    }
}

/// Both ends of an OS pipe as seen by the parent.
///
/// Dropping it closes both ends. Children inherit copies across `fork` and
/// close the end they do not use themselves.
struct Pipe {
    read: RawFd,
    write: RawFd,
}

impl Pipe {
    fn open() -> Result<Self, ResourceError> {
        let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC).map_err(ResourceError::Pipe)?;
        trace!("opened pipe r={} w={}", read, write);
        Ok(Pipe { read, write })
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        for fd in [self.read, self.write] {
            if let Err(errno) = unistd::close(fd) {
                warn!("closing pipe descriptor {}: {}", fd, errno);
            }
        }
        trace!("closed parent pipe ends r={} w={}", self.read, self.write);
    }
}

/// Retries a system call interrupted by a signal.
fn syscall<F, T>(f: F) -> Result<T, Errno>
where
    F: Fn() -> Result<T, Errno>,
{
    loop {
        match f() {
            Err(Errno::EINTR) => (),
            result => return result,
        }
    }
}

fn spawn(command: &PreparedCommand, envp: &[CString], wiring: StdioWiring) -> Result<Pid, ResourceError> {
    if !command.is_resolved() {
        debug!("{} not found on the search path", command.name());
    }
    // Anything still buffered would otherwise be interleaved with the child's output.
    if let Err(err) = std::io::stdout().flush() {
        warn!("flushing stdout before fork: {}", err);
    }

    match unsafe { unistd::fork() } {
        Ok(ForkResult::Parent { child }) => {
            debug!("spawned {} as pid {} ({:?})", command.name(), child, wiring);
            Ok(child)
        }
        Ok(ForkResult::Child) => external::exec_child(command, envp, wiring),
        Err(source) => {
            error!("fork failed for {}: {}", command.name(), source);
            Err(ResourceError::Fork {
                program: command.name().to_string(),
                source,
            })
        }
    }
}

fn wait_child(pid: Pid, program: &str) -> ChildReport {
    let outcome = match syscall(|| wait::waitpid(pid, None)) {
        Ok(status) => {
            debug!("pid {} finished: {:?}", pid, status);
            ChildOutcome::from(status)
        }
        Err(errno) => {
            error!("waitpid failed for pid {}: {}", pid, errno);
            ChildOutcome::Abnormal
        }
    };
    ChildReport {
        pid,
        program: program.to_string(),
        outcome,
    }
}

/// Kills and reaps a child whose sibling could not be created.
fn abandon(pid: Pid, program: &str) {
    warn!("abandoning {} (pid {})", program, pid);
    if let Err(errno) = signal::kill(pid, Signal::SIGKILL) {
        warn!("kill {} failed: {}", pid, errno);
    }
    match syscall(|| wait::waitpid(pid, None)) {
        Ok(status) => debug!("abandoned pid {} reaped: {:?}", pid, status),
        Err(errno) => warn!("reaping {} failed: {}", pid, errno),
    }
}

/// Runs one or two commands and waits for all of them.
///
/// Returns one report per child, in stage order. Failures inside a child
/// (a redirection that cannot be opened, a program that cannot be executed)
/// show up as that child's exit status; the other stage keeps running with the
/// wiring it was given.
pub fn execute(plan: &PipelinePlan, env: &Environment) -> Result<Vec<ChildReport>, ShellError> {
    let envp = env.to_envp()?;
    let first = PreparedCommand::prepare(&plan.first, env)?;
    match &plan.second {
        None => run_single(&first, &envp),
        Some(second) => {
            let second = PreparedCommand::prepare(second, env)?;
            run_piped(&first, &second, &envp)
        }
    }
}

fn run_single(command: &PreparedCommand, envp: &[CString]) -> Result<Vec<ChildReport>, ShellError> {
    let pid = spawn(command, envp, StdioWiring::Inherit)?;
    Ok(vec![wait_child(pid, command.name())])
}

fn run_piped(
    first: &PreparedCommand,
    second: &PreparedCommand,
    envp: &[CString],
) -> Result<Vec<ChildReport>, ShellError> {
    let pipe = Pipe::open()?;
    let (read, write) = (pipe.read, pipe.write);

    let first_pid = spawn(first, envp, StdioWiring::PipeWriter { read, write })?;
    let second_pid = match spawn(second, envp, StdioWiring::PipeReader { read, write }) {
        Ok(pid) => pid,
        Err(err) => {
            drop(pipe);
            abandon(first_pid, first.name());
            return Err(err.into());
        }
    };

    // The reader only sees end-of-stream once no process holds the write end.
    drop(pipe);

    Ok(vec![
        wait_child(first_pid, first.name()),
        wait_child(second_pid, second.name()),
    ])
}

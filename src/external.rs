use crate::env::Environment;
use crate::parser::ParsedCommand;
use nix::errno::Errno;
use nix::fcntl::{self, FcntlArg, FdFlag, OFlag};
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::stat::Mode;
use nix::unistd;
use std::borrow::Cow;
use std::ffi::{CStr, CString, NulError, OsStr};
use std::os::fd::RawFd;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Search path used when the session has no `PATH` variable.
pub const DEFAULT_SEARCH_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Exit status of a child whose program could not be found.
pub const STATUS_NOT_FOUND: i32 = 127;
/// Exit status of a child whose program was found but could not be executed.
pub const STATUS_NOT_EXECUTABLE: i32 = 126;
/// Exit status of a child that failed to wire its standard streams.
pub const STATUS_REDIRECT_FAILED: i32 = 1;

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Empty name: returns `None`.
/// - Any name containing a `/`: returned as is; the kernel decides at exec time.
/// - Otherwise: search each directory in `search_paths` (PATH) and return the
///   first executable regular file.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    let name = path.as_os_str();
    if name.is_empty() {
        return None;
    }
    if name.as_bytes().contains(&b'/') {
        return Some(Cow::Borrowed(path));
    }
    find_in_path(search_paths, name).map(Cow::Owned)
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|candidate| is_executable_file(candidate))
}

fn is_executable_file(path: &Path) -> bool {
    match path.metadata() {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// Everything a child needs in order to become `argv[0]`, prepared in the parent.
///
/// Preparing ahead of `fork` means the child only has to make system calls.
#[derive(Debug)]
pub struct PreparedCommand {
    name: String,
    program: Option<CString>,
    argv: Vec<CString>,
    input: Option<CString>,
    output: Option<CString>,
    append: bool,
}

impl PreparedCommand {
    /// Resolves the program against the session `PATH` and converts every string
    /// to the form the OS expects.
    pub fn prepare(command: &ParsedCommand, env: &Environment) -> Result<Self, NulError> {
        let name = command.program().unwrap_or_default().to_string();
        let search_paths = env
            .get_var("PATH")
            .unwrap_or_else(|| OsStr::new(DEFAULT_SEARCH_PATH));
        let program = find_command_path(search_paths, Path::new(&name))
            .map(|path| CString::new(path.as_os_str().as_bytes()))
            .transpose()?;
        let argv = command
            .argv
            .iter()
            .map(|arg| CString::new(arg.as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;
        let input = command.input_path.as_deref().map(CString::new).transpose()?;
        let output = command.output_path.as_deref().map(CString::new).transpose()?;

        Ok(Self {
            name,
            program,
            argv,
            input,
            output,
            append: command.append,
        })
    }

    /// `argv[0]` as typed by the user.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the program was found before forking.
    pub fn is_resolved(&self) -> bool {
        self.program.is_some()
    }
}

/// How a child's standard streams are connected to a pipe before its own
/// redirections are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StdioWiring {
    Inherit,
    /// Writes into the pipe: standard output becomes `write`, `read` is closed.
    PipeWriter { read: RawFd, write: RawFd },
    /// Reads from the pipe: standard input becomes `read`, `write` is closed.
    PipeReader { read: RawFd, write: RawFd },
}

struct ChildFailure<'a> {
    subject: &'a [u8],
    context: &'static str,
    errno: Option<Errno>,
    status: i32,
}

impl ChildFailure<'_> {
    /// Writes `pipesh: <subject>: <context>[: <errno>]` to standard error and
    /// terminates the child without running any destructors.
    fn exit(self) -> ! {
        let mut parts: [&[u8]; 7] = [b"pipesh: ", self.subject, b": ", self.context.as_bytes(), b"", b"", b"\n"];
        if let Some(errno) = self.errno {
            parts[4] = b": ";
            parts[5] = errno.desc().as_bytes();
        }
        for part in parts {
            let _ = unistd::write(libc::STDERR_FILENO, part);
        }
        unsafe { libc::_exit(self.status) }
    }
}

/// Makes `fd` the descriptor `target` and releases the original.
///
/// When the two already coincide only the close-on-exec flag is cleared, so the
/// stream survives the exec.
fn rebind(fd: RawFd, target: RawFd) -> nix::Result<()> {
    if fd == target {
        fcntl::fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty()))?;
        return Ok(());
    }
    unistd::dup2(fd, target)?;
    let _ = unistd::close(fd);
    Ok(())
}

fn wire_pipe<'a>(wiring: StdioWiring) -> Result<(), ChildFailure<'a>> {
    let (keep, unused, target, context) = match wiring {
        StdioWiring::Inherit => return Ok(()),
        StdioWiring::PipeWriter { read, write } => {
            (write, read, libc::STDOUT_FILENO, "failed to redirect stdout to pipe")
        }
        StdioWiring::PipeReader { read, write } => {
            (read, write, libc::STDIN_FILENO, "failed to redirect stdin to pipe")
        }
    };
    let _ = unistd::close(unused);
    rebind(keep, target).map_err(|errno| ChildFailure {
        subject: b"pipe",
        context,
        errno: Some(errno),
        status: STATUS_REDIRECT_FAILED,
    })
}

fn open_and_rebind<'a>(
    path: &'a CStr,
    flags: OFlag,
    target: RawFd,
    context: &'static str,
) -> Result<(), ChildFailure<'a>> {
    let mode = Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IROTH;
    let failure = move |errno: Errno| ChildFailure {
        subject: path.to_bytes(),
        context,
        errno: Some(errno),
        status: STATUS_REDIRECT_FAILED,
    };
    let fd = fcntl::open(path, flags | OFlag::O_CLOEXEC, mode).map_err(failure)?;
    rebind(fd, target).map_err(failure)
}

fn redirect_files(command: &PreparedCommand) -> Result<(), ChildFailure<'_>> {
    if let Some(input) = &command.input {
        open_and_rebind(
            input,
            OFlag::O_RDONLY,
            libc::STDIN_FILENO,
            "failed to open input file",
        )?;
    }
    if let Some(output) = &command.output {
        let mode = if command.append {
            OFlag::O_APPEND
        } else {
            OFlag::O_TRUNC
        };
        open_and_rebind(
            output,
            OFlag::O_WRONLY | OFlag::O_CREAT | mode,
            libc::STDOUT_FILENO,
            "failed to open output file",
        )?;
    }
    Ok(())
}

/// Runs in a freshly forked child: wires the pipe, applies the command's own
/// redirections, then replaces the process image. Never returns.
///
/// Only system calls happen here; nothing is logged and no destructor runs.
pub(crate) fn exec_child(command: &PreparedCommand, envp: &[CString], wiring: StdioWiring) -> ! {
    // The Rust runtime ignores SIGPIPE and ignored signals survive exec.
    let _ = unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) };

    if let Err(failure) = wire_pipe(wiring).and_then(|()| redirect_files(command)) {
        failure.exit();
    }

    let Some(program) = &command.program else {
        ChildFailure {
            subject: command.name.as_bytes(),
            context: "command not found",
            errno: None,
            status: STATUS_NOT_FOUND,
        }
        .exit()
    };

    let errno = match unistd::execve(program, &command.argv, envp) {
        Err(errno) => errno,
        Ok(never) => match never {},
    };
    let status = if errno == Errno::ENOENT {
        STATUS_NOT_FOUND
    } else {
        STATUS_NOT_EXECUTABLE
    };
    ChildFailure {
        subject: command.name.as_bytes(),
        context: "exec failed",
        errno: Some(errno),
        status,
    }
    .exit()
}

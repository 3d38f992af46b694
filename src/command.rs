use crate::builtin::BuiltinKind;
use crate::errors::{ShellError, ShellResult};
use crate::parser::{Redirect, RedirectKind, RedirectionSpec, StdStream};
use crate::terminal::CrlfWriter;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Stdio;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// What the interactive loop should do after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitSignal {
    Continue,
    Exit(ExitCode),
}

/// How a command name was resolved. Produced once per command and consumed by execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Builtin(BuiltinKind),
    External(PathBuf),
    NotFound,
}

/// Destination of one of a command's output streams.
#[derive(Debug)]
pub enum Sink {
    /// The stream inherited from the interpreter. `crlf` is set while the terminal is raw.
    Inherited { stream: StdStream, crlf: bool },
    /// A file opened for redirection. Closed when the sink is dropped.
    File(File),
}

impl Sink {
    pub fn inherited(stream: StdStream, crlf: bool) -> Self {
        Sink::Inherited { stream, crlf }
    }

    /// Open the target of `redirect`, creating it with mode 0644 if needed.
    pub fn open(redirect: &Redirect) -> ShellResult<Self> {
        let mut options = OpenOptions::new();
        options.write(true).create(true);
        match redirect.kind {
            RedirectKind::Truncate => options.truncate(true),
            RedirectKind::Append => options.append(true),
        };
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }

        options
            .open(&redirect.target)
            .map(Sink::File)
            .map_err(|source| ShellError::FileOpen {
                path: redirect.target.clone(),
                source,
            })
    }

    /// A handle suitable for a child process' stdout or stderr.
    pub fn stdio(&self) -> io::Result<Stdio> {
        match self {
            Sink::Inherited { .. } => Ok(Stdio::inherit()),
            Sink::File(file) => Ok(Stdio::from(file.try_clone()?)),
        }
    }
}

fn write_through<W: Write>(inner: W, crlf: bool, buf: &[u8]) -> io::Result<usize> {
    if crlf {
        CrlfWriter::new(inner).write(buf)
    } else {
        let mut inner = inner;
        inner.write(buf)
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Inherited {
                stream: StdStream::Stdout,
                crlf,
            } => write_through(io::stdout().lock(), *crlf, buf),
            Sink::Inherited {
                stream: StdStream::Stderr,
                crlf,
            } => write_through(io::stderr().lock(), *crlf, buf),
            Sink::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Inherited {
                stream: StdStream::Stdout,
                ..
            } => io::stdout().flush(),
            Sink::Inherited {
                stream: StdStream::Stderr,
                ..
            } => io::stderr().flush(),
            Sink::File(file) => file.flush(),
        }
    }
}

/// A command ready to run: its name, arguments and both output sinks.
///
/// The descriptor owns any file opened for redirection, so the handles live exactly as long
/// as the command and are closed once, either by [`CommandDescriptor::close`] or on drop.
#[derive(Debug)]
pub struct CommandDescriptor {
    pub name: String,
    pub args: Vec<String>,
    pub stdout: Sink,
    pub stderr: Sink,
}

impl CommandDescriptor {
    /// Build a descriptor from command tokens, opening redirection targets.
    ///
    /// Returns `Ok(None)` for an empty command; nothing is opened in that case. If the
    /// stderr target cannot be opened, the already opened stdout file is closed before the
    /// error is returned.
    pub fn build(
        tokens: Vec<String>,
        redirects: &RedirectionSpec,
        crlf: bool,
    ) -> ShellResult<Option<Self>> {
        let mut tokens = tokens.into_iter();
        let Some(name) = tokens.next() else {
            return Ok(None);
        };

        let stdout = match &redirects.stdout {
            Some(redirect) => Sink::open(redirect)?,
            None => Sink::inherited(StdStream::Stdout, crlf),
        };
        let stderr = match &redirects.stderr {
            Some(redirect) => Sink::open(redirect)?,
            None => Sink::inherited(StdStream::Stderr, crlf),
        };

        Ok(Some(Self {
            name,
            args: tokens.collect(),
            stdout,
            stderr,
        }))
    }

    /// Flush both sinks and release any redirection files.
    pub fn close(mut self) -> io::Result<()> {
        let stdout = self.stdout.flush();
        let stderr = self.stderr.flush();
        drop(self);
        stdout.and(stderr)
    }
}

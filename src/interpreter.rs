use crate::builtin::{BuiltinContext, BuiltinKind};
use crate::command::{CommandDescriptor, ExitCode, ExitSignal, Resolution, Sink};
use crate::completion::CandidateIndex;
use crate::editor::{EditOutcome, LineEditor};
use crate::env::Environment;
use crate::errors::{ShellError, ShellResult};
use crate::external::{ExecutableLookup, ExternalCommand, FsLookup, find_command_path};
use crate::lexer;
use crate::parser::{self, RedirectionSpec, StdStream};
use log::{debug, info, warn};
use std::fmt::Display;
use std::io::{Read, Write};

/// Exit status used when the line editor sees Ctrl-C.
pub const INTERRUPTED_STATUS: ExitCode = 130;
const NOT_FOUND_STATUS: ExitCode = 127;
const CANNOT_EXECUTE_STATUS: ExitCode = 126;

/// A minimal shell-like interpreter that can execute built-in and external commands.
///
/// The interpreter maintains an [`Environment`] and an [`ExecutableLookup`] used both to
/// resolve commands on `PATH` and to offer tab-completion candidates.
///
/// Example
/// ```
/// use rawsh::Interpreter;
/// use rawsh::command::ExitSignal;
/// let mut sh = Interpreter::default();
/// assert_eq!(sh.run_line("exit 7"), ExitSignal::Exit(7));
/// ```
pub struct Interpreter {
    env: Environment,
    lookup: Box<dyn ExecutableLookup>,
    terminal_output: bool,
}

impl Interpreter {
    /// Create a new interpreter with a custom environment and filesystem lookup.
    pub fn new(env: Environment, lookup: Box<dyn ExecutableLookup>) -> Self {
        Self {
            env,
            lookup,
            terminal_output: false,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Translate newlines for inherited streams because the terminal is in raw mode.
    pub fn set_terminal_output(&mut self, raw: bool) {
        self.terminal_output = raw;
    }

    /// Decide once whether `name` is a builtin, an executable on `PATH`, or unknown.
    pub fn resolve(&self, name: &str) -> Resolution {
        if let Some(kind) = BuiltinKind::from_name(name) {
            return Resolution::Builtin(kind);
        }
        match find_command_path(self.lookup.as_ref(), &self.env.search_path(), name) {
            Some(path) => Resolution::External(path),
            None => Resolution::NotFound,
        }
    }

    /// Tokenize, extract redirections and dispatch one committed line.
    ///
    /// Errors are reported on the interpreter's stderr and never end the loop; only the
    /// `exit` builtin produces [`ExitSignal::Exit`].
    pub fn run_line(&mut self, line: &str) -> ExitSignal {
        let tokens = lexer::split_into_tokens(line);
        if tokens.is_empty() {
            return ExitSignal::Continue;
        }
        debug!("tokens: {tokens:?}");

        let result = parser::extract_redirections(tokens)
            .and_then(|(tokens, redirects)| self.dispatch(tokens, &redirects));
        match result {
            Ok(signal) => signal,
            Err(e) => {
                warn!("line abandoned: {e}");
                self.report(&e);
                ExitSignal::Continue
            }
        }
    }

    /// Run one command with its redirections applied.
    ///
    /// An empty command is a no-op. Redirection files are opened right before the command
    /// runs and closed before this returns, whichever branch ran and whether it failed.
    pub fn dispatch(
        &mut self,
        tokens: Vec<String>,
        redirects: &RedirectionSpec,
    ) -> ShellResult<ExitSignal> {
        let Some(mut descriptor) =
            CommandDescriptor::build(tokens, redirects, self.terminal_output)?
        else {
            return Ok(ExitSignal::Continue);
        };

        let resolution = self.resolve(&descriptor.name);
        debug!("{} resolved to {resolution:?}", descriptor.name);

        let status = self.execute(&resolution, &mut descriptor);
        let closed = descriptor.close();
        let status = status?;
        closed?;

        self.env.last_status = status;
        Ok(match self.env.exit_request.take() {
            Some(code) => ExitSignal::Exit(code),
            None => ExitSignal::Continue,
        })
    }

    fn execute(
        &mut self,
        resolution: &Resolution,
        descriptor: &mut CommandDescriptor,
    ) -> ShellResult<ExitCode> {
        match resolution {
            Resolution::Builtin(kind) => {
                let mut ctx = BuiltinContext {
                    stdout: &mut descriptor.stdout,
                    stderr: &mut descriptor.stderr,
                    env: &mut self.env,
                    lookup: self.lookup.as_ref(),
                };
                Ok(kind.run(&descriptor.args, &mut ctx))
            }
            Resolution::External(path) => {
                descriptor.stdout.flush()?;
                descriptor.stderr.flush()?;
                let command = ExternalCommand::new(
                    descriptor.name.clone(),
                    path.clone(),
                    descriptor.args.clone(),
                );
                let spawned =
                    command.execute(descriptor.stdout.stdio()?, descriptor.stderr.stdio()?, &self.env);
                match spawned {
                    Ok(code) => Ok(code),
                    Err(e @ ShellError::Spawn { .. }) => {
                        warn!("{e}");
                        writeln!(descriptor.stderr, "{e}")?;
                        Ok(CANNOT_EXECUTE_STATUS)
                    }
                    Err(e) => Err(e),
                }
            }
            Resolution::NotFound => {
                writeln!(descriptor.stdout, "{}: command not found", descriptor.name)?;
                Ok(NOT_FOUND_STATUS)
            }
        }
    }

    /// Read-eval loop: edit a line, run it, repeat.
    ///
    /// Returns the status the process should exit with: the code given to `exit`,
    /// [`INTERRUPTED_STATUS`] after Ctrl-C, or 0 when input ends.
    pub fn repl(&mut self, input: &mut dyn Read, out: &mut dyn Write) -> ShellResult<ExitCode> {
        info!(
            "interactive loop started, {} PATH entries",
            self.env.search_path().len()
        );
        let mut editor = LineEditor::new();

        loop {
            let search_path = self.env.search_path();
            let index = CandidateIndex::new(self.lookup.as_ref(), &search_path);
            let outcome = editor
                .read_line(input, &index, out)
                .map_err(ShellError::Terminal)?;

            match outcome {
                EditOutcome::Committed(line) => {
                    debug!("committed line: {line:?}");
                    if let ExitSignal::Exit(code) = self.run_line(&line) {
                        info!("exit requested with status {code}");
                        return Ok(code);
                    }
                }
                EditOutcome::Aborted => {
                    info!("interrupted");
                    return Ok(INTERRUPTED_STATUS);
                }
                EditOutcome::EndOfInput | EditOutcome::Pending => {
                    info!("end of input");
                    return Ok(0);
                }
            }
        }
    }

    fn report(&self, err: &dyn Display) {
        let mut sink = Sink::inherited(StdStream::Stderr, self.terminal_output);
        if let Err(e) = writeln!(sink, "{err}").and_then(|()| sink.flush()) {
            warn!("cannot report error to stderr: {e}");
        }
    }
}

impl Default for Interpreter {
    /// An interpreter over the process environment and the real filesystem.
    fn default() -> Self {
        Self::new(Environment::new(), Box::new(FsLookup))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::MemLookup;
    use crate::parser::{Redirect, RedirectKind};
    use std::collections::HashMap;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn interpreter(lookup: MemLookup) -> Interpreter {
        let mut vars = HashMap::new();
        vars.insert("PATH".to_string(), "/usr/bin:/bin".to_string());
        Interpreter::new(Environment::with_vars(vars, "/"), Box::new(lookup))
    }

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn to(path: &Path, kind: RedirectKind) -> Option<Redirect> {
        Some(Redirect {
            target: path.to_string_lossy().into_owned(),
            kind,
        })
    }

    #[test]
    fn resolution_prefers_builtins_then_path_order() {
        let sh = interpreter(
            MemLookup::new()
                .with_executables("/usr/bin", &["cat"])
                .with_executables("/bin", &["cat", "echo"]),
        );
        assert_eq!(sh.resolve("echo"), Resolution::Builtin(BuiltinKind::Echo));
        assert_eq!(
            sh.resolve("cat"),
            Resolution::External(PathBuf::from("/usr/bin/cat"))
        );
        assert_eq!(sh.resolve("nope"), Resolution::NotFound);
    }

    #[test]
    fn empty_command_is_a_no_op() {
        let mut sh = interpreter(MemLookup::new());
        assert_eq!(
            sh.dispatch(Vec::new(), &RedirectionSpec::default()).unwrap(),
            ExitSignal::Continue
        );
        assert_eq!(sh.run_line("    "), ExitSignal::Continue);
    }

    #[test]
    fn builtin_output_goes_to_redirected_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let mut sh = interpreter(MemLookup::new());

        let line = format!("echo 'hello   world' > {}", out.display());
        assert_eq!(sh.run_line(&line), ExitSignal::Continue);
        assert_eq!(fs::read_to_string(&out).unwrap(), "hello   world\n");

        let line = format!("echo again 1>> {}", out.display());
        sh.run_line(&line);
        assert_eq!(fs::read_to_string(&out).unwrap(), "hello   world\nagain\n");
    }

    /// Number of descriptors of this process that point at `path`.
    #[cfg(target_os = "linux")]
    fn open_handles_to(path: &Path) -> usize {
        let target = fs::canonicalize(path).unwrap();
        fs::read_dir("/proc/self/fd")
            .unwrap()
            .flatten()
            .filter(|entry| fs::read_link(entry.path()).is_ok_and(|link| link == target))
            .count()
    }

    #[test]
    fn command_not_found_goes_to_stdout_sink() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let err = dir.path().join("err.txt");
        let mut sh = interpreter(MemLookup::new());

        let spec = RedirectionSpec {
            stdout: to(&out, RedirectKind::Truncate),
            stderr: to(&err, RedirectKind::Truncate),
        };
        let signal = sh.dispatch(words(&["missing_cmd", "arg"]), &spec).unwrap();

        assert_eq!(signal, ExitSignal::Continue);
        assert_eq!(sh.env().last_status, NOT_FOUND_STATUS);
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "missing_cmd: command not found\n"
        );
        assert_eq!(fs::read_to_string(&err).unwrap(), "");
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn redirection_files_are_closed_on_every_branch() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let err = dir.path().join("err.txt");
        let mut sh = interpreter(
            MemLookup::new().with_executables("/bin", &["phantom_tool_xyz"]),
        );
        let spec = RedirectionSpec {
            stdout: to(&out, RedirectKind::Append),
            stderr: to(&err, RedirectKind::Append),
        };

        // Not found, builtin, and an external command whose spawn fails.
        for name in ["missing_cmd", "echo", "phantom_tool_xyz"] {
            sh.dispatch(words(&[name, "arg"]), &spec).unwrap();
            assert_eq!(open_handles_to(&out), 0, "stdout left open after {name}");
            assert_eq!(open_handles_to(&err), 0, "stderr left open after {name}");
        }
        assert_eq!(sh.env().last_status, CANNOT_EXECUTE_STATUS);

        // The stderr target cannot be opened: the stdout file is released too.
        let bad = RedirectionSpec {
            stdout: to(&out, RedirectKind::Append),
            stderr: to(&dir.path().join("no-such-dir").join("e"), RedirectKind::Append),
        };
        assert!(sh.dispatch(words(&["echo", "x"]), &bad).is_err());
        assert_eq!(open_handles_to(&out), 0);
    }

    #[test]
    fn builtin_errors_go_to_stderr_sink() {
        let dir = tempfile::tempdir().unwrap();
        let err = dir.path().join("err.txt");
        let mut sh = interpreter(MemLookup::new());

        let line = format!("cd /no/such/dir/anywhere 2> {}", err.display());
        assert_eq!(sh.run_line(&line), ExitSignal::Continue);
        assert_eq!(
            fs::read_to_string(&err).unwrap(),
            "cd: /no/such/dir/anywhere: No such file or directory\n"
        );
        assert_eq!(sh.env().current_dir, PathBuf::from("/"));
    }

    #[test]
    fn missing_filename_abandons_the_line() {
        let mut sh = interpreter(MemLookup::new());
        let err = parser::extract_redirections(words(&["exit", "4", ">"]))
            .and_then(|(tokens, spec)| sh.dispatch(tokens, &spec))
            .unwrap_err();
        assert!(matches!(err, ShellError::MissingRedirectionFilename { .. }));

        // Nothing ran, so exit was not requested.
        assert_eq!(sh.run_line("exit 4 >"), ExitSignal::Continue);
        assert_eq!(sh.env().exit_request, None);
    }

    #[test]
    fn unopenable_stderr_target_closes_stdout_and_skips_command() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let bad = dir.path().join("no-such-dir").join("err.txt");
        let mut sh = interpreter(MemLookup::new());

        let spec = RedirectionSpec {
            stdout: to(&out, RedirectKind::Truncate),
            stderr: to(&bad, RedirectKind::Truncate),
        };
        let err = sh.dispatch(words(&["exit", "9"]), &spec).unwrap_err();

        assert!(matches!(err, ShellError::FileOpen { .. }));
        assert_eq!(sh.env().exit_request, None);
        assert_eq!(fs::read_to_string(&out).unwrap(), "");
    }

    #[test]
    fn exit_signal_carries_the_code() {
        let mut sh = interpreter(MemLookup::new());
        assert_eq!(sh.run_line("exit"), ExitSignal::Exit(0));
        assert_eq!(sh.run_line("exit 12"), ExitSignal::Exit(12));
        assert_eq!(sh.run_line("exit -5"), ExitSignal::Exit(-5));
        assert_eq!(sh.run_line("exit --bogus"), ExitSignal::Exit(0));
        assert_eq!(sh.run_line("exit 1 2"), ExitSignal::Exit(1));
        assert_eq!(sh.env().exit_request, None);
    }

    #[test]
    fn spawn_failure_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = dir.path().join("err.txt");
        // Listed on PATH but absent on disk, so the spawn fails.
        let mut sh = interpreter(MemLookup::new().with_executables("/bin", &["phantom_tool_xyz"]));

        let line = format!("phantom_tool_xyz 2> {}", err.display());
        assert_eq!(sh.run_line(&line), ExitSignal::Continue);
        assert_eq!(sh.env().last_status, CANNOT_EXECUTE_STATUS);
        assert!(
            fs::read_to_string(&err)
                .unwrap()
                .starts_with("phantom_tool_xyz: ")
        );
    }

    #[test]
    #[cfg(unix)]
    fn external_command_writes_into_redirection_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let err = dir.path().join("err.txt");
        let mut sh = Interpreter::new(
            {
                let mut vars = HashMap::new();
                vars.insert("PATH".to_string(), "/bin:/usr/bin".to_string());
                Environment::with_vars(vars, dir.path())
            },
            Box::new(FsLookup),
        );

        let line = format!(
            "sh -c 'echo out; echo err >&2; exit 5' > {} 2>> {}",
            out.display(),
            err.display()
        );
        assert_eq!(sh.run_line(&line), ExitSignal::Continue);
        assert_eq!(sh.env().last_status, 5);
        assert_eq!(fs::read_to_string(&out).unwrap(), "out\n");
        assert_eq!(fs::read_to_string(&err).unwrap(), "err\n");
    }
}

use crate::command::ExitCode;
use crate::env::Environment;
use crate::external::{ExecutableLookup, find_command_path};
use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use log::warn;
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Everything a builtin may touch while it runs.
pub(crate) struct BuiltinContext<'a> {
    pub stdout: &'a mut dyn Write,
    pub stderr: &'a mut dyn Write,
    pub env: &'a mut Environment,
    pub lookup: &'a dyn ExecutableLookup,
}

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    const NAME: &'static str;

    /// Executes the command using the provided streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, ctx: &mut BuiltinContext<'_>) -> Result<ExitCode>;
}

/// The closed set of builtins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    Echo,
    Exit,
    Type,
    Pwd,
    Cd,
}

impl BuiltinKind {
    pub const ALL: [BuiltinKind; 5] = [
        BuiltinKind::Echo,
        BuiltinKind::Exit,
        BuiltinKind::Type,
        BuiltinKind::Pwd,
        BuiltinKind::Cd,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinKind::Echo => Echo::NAME,
            BuiltinKind::Exit => Exit::NAME,
            BuiltinKind::Type => Type::NAME,
            BuiltinKind::Pwd => Pwd::NAME,
            BuiltinKind::Cd => Cd::NAME,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        Self::ALL.into_iter().map(BuiltinKind::name)
    }

    /// Parse `args` for this builtin and run it.
    ///
    /// Argument errors and failures of the builtin itself are written to the stderr sink
    /// and turned into status 1.
    pub(crate) fn run(self, args: &[String], ctx: &mut BuiltinContext<'_>) -> ExitCode {
        let outcome = match self {
            BuiltinKind::Echo => run::<Echo>(args, ctx),
            BuiltinKind::Exit => run::<Exit>(args, ctx),
            BuiltinKind::Type => run::<Type>(args, ctx),
            BuiltinKind::Pwd => run::<Pwd>(args, ctx),
            BuiltinKind::Cd => run::<Cd>(args, ctx),
        };
        match outcome {
            Ok(code) => code,
            Err(e) => {
                if let Err(write_err) = writeln!(ctx.stderr, "{}: {e:#}", self.name()) {
                    warn!("cannot report {} failure: {write_err}", self.name());
                }
                1
            }
        }
    }
}

fn run<T: BuiltinCommand>(args: &[String], ctx: &mut BuiltinContext<'_>) -> Result<ExitCode> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match T::from_args(&[T::NAME], &args) {
        Ok(cmd) => cmd.execute(ctx),
        Err(EarlyExit { output, status }) => {
            if status.is_ok() {
                ctx.stdout.write_all(output.as_bytes())?;
                Ok(0)
            } else {
                ctx.stderr.write_all(output.as_bytes())?;
                Ok(1)
            }
        }
    }
}

/// Write the arguments to standard output, separated by spaces, followed by a newline.
///
/// Every argument is printed verbatim, including ones that look like flags, so the
/// argument list is taken as is instead of going through the derived parser.
pub struct Echo {
    pub args: Vec<String>,
}

impl FromArgs for Echo {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Echo {
            args: args.iter().map(|arg| arg.to_string()).collect(),
        })
    }
}

impl BuiltinCommand for Echo {
    const NAME: &'static str = "echo";

    fn execute(self, ctx: &mut BuiltinContext<'_>) -> Result<ExitCode> {
        writeln!(ctx.stdout, "{}", self.args.join(" "))?;
        Ok(0)
    }
}

/// Exit the shell with the given status (0 when omitted).
///
/// Only the first argument is read, and it is taken raw so negative codes and
/// flag-like words still reach the integer conversion. Extra arguments are ignored.
pub struct Exit {
    pub code: Option<String>,
}

impl FromArgs for Exit {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Exit {
            code: args.first().map(|arg| arg.to_string()),
        })
    }
}

impl BuiltinCommand for Exit {
    const NAME: &'static str = "exit";

    fn execute(self, ctx: &mut BuiltinContext<'_>) -> Result<ExitCode> {
        let code = match self.code.as_deref() {
            None => 0,
            Some(raw) => match raw.parse::<ExitCode>() {
                Ok(code) => code,
                Err(e) => {
                    writeln!(ctx.stderr, "exit: {raw}: {e}")?;
                    0
                }
            },
        };
        ctx.env.exit_request = Some(code);
        Ok(code)
    }
}

#[derive(FromArgs)]
/// Describe how each name would be interpreted if used as a command.
pub struct Type {
    #[argh(positional)]
    /// command names to look up
    pub names: Vec<String>,
}

impl BuiltinCommand for Type {
    const NAME: &'static str = "type";

    fn execute(self, ctx: &mut BuiltinContext<'_>) -> Result<ExitCode> {
        if self.names.is_empty() {
            writeln!(ctx.stderr, "type: missing argument")?;
            return Ok(1);
        }

        let search_path = ctx.env.search_path();
        let mut status = 0;
        for name in &self.names {
            if BuiltinKind::from_name(name).is_some() {
                writeln!(ctx.stdout, "{name} is a shell builtin")?;
            } else if let Some(path) = find_command_path(ctx.lookup, &search_path, name) {
                writeln!(ctx.stdout, "{name} is {}", path.display())?;
            } else {
                writeln!(ctx.stdout, "{name}: not found")?;
                status = 1;
            }
        }
        Ok(status)
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    const NAME: &'static str = "pwd";

    fn execute(self, ctx: &mut BuiltinContext<'_>) -> Result<ExitCode> {
        writeln!(ctx.stdout, "{}", ctx.env.current_dir.display())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute, relative, or starting with `~`. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl Cd {
    /// Expand a leading `~` (alone or followed by `/`) to `HOME`.
    fn expand_home(target: &str, home: Option<String>) -> Option<String> {
        match target.strip_prefix('~') {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => {
                home.map(|home| format!("{home}{rest}"))
            }
            _ => Some(target.to_string()),
        }
    }
}

impl BuiltinCommand for Cd {
    const NAME: &'static str = "cd";

    fn execute(self, ctx: &mut BuiltinContext<'_>) -> Result<ExitCode> {
        let home = ctx.env.get_var("HOME");
        let requested = self.target.unwrap_or_else(|| "~".to_string());
        let Some(expanded) = Self::expand_home(&requested, home) else {
            writeln!(ctx.stderr, "cd: HOME not set")?;
            return Ok(1);
        };

        let target = PathBuf::from(&expanded);
        let new_dir = if target.is_absolute() {
            target
        } else {
            ctx.env.current_dir.join(target)
        };

        let changed = fs::canonicalize(&new_dir).and_then(|canonical| {
            env::set_current_dir(&canonical)?;
            Ok(canonical)
        });
        match changed {
            Ok(canonical) => {
                ctx.env.current_dir = canonical;
                Ok(0)
            }
            Err(_) => {
                writeln!(ctx.stderr, "cd: {expanded}: No such file or directory")?;
                Ok(1)
            }
        }
    }
}

use rawsh::Interpreter;
use rawsh::command::ExitCode;
use rawsh::config::{self, Args};
use rawsh::errors::ShellResult;
use rawsh::terminal::RawModeGuard;
use std::io;

fn main() {
    let args: Args = argh::from_env();
    if let Err(e) = config::init_logging(&args) {
        eprintln!("rawsh: {e:#}");
    }

    let code = match run(&args) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e}");
            eprintln!("rawsh: {e}");
            1
        }
    };
    std::process::exit(code);
}

/// Runs the interactive loop. The terminal is restored when the guard drops, before
/// `main` terminates the process.
fn run(args: &Args) -> ShellResult<ExitCode> {
    let guard = RawModeGuard::acquire(!args.no_raw);
    let mut interpreter = Interpreter::default();
    interpreter.set_terminal_output(guard.is_active());

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();
    interpreter.repl(&mut input, &mut out)
}

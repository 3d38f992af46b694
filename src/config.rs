//! Command-line options and logging setup for the `rawsh` binary.

use anyhow::{Context, Result};
use argh::FromArgs;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::OpenOptions;
use std::path::PathBuf;

#[derive(FromArgs, Debug)]
/// An interactive command interpreter with tab completion and output redirection.
pub struct Args {
    #[argh(option)]
    /// append diagnostic logs to this file; nothing is logged when omitted
    pub log_file: Option<PathBuf>,

    #[argh(option, default = "LevelFilter::Info", from_str_fn(parse_level))]
    /// log verbosity: off, error, warn, info, debug or trace (default: info)
    pub log_level: LevelFilter,

    #[argh(switch)]
    /// keep the terminal in its normal mode, for piped or scripted input
    pub no_raw: bool,
}

fn parse_level(value: &str) -> Result<LevelFilter, String> {
    value
        .parse::<LevelFilter>()
        .map_err(|_| format!("unknown log level `{value}`"))
}

/// Install a file logger when `--log-file` is given.
///
/// Logs never go to the terminal: in raw mode they would corrupt the line being edited.
pub fn init_logging(args: &Args) -> Result<()> {
    let Some(path) = &args.log_file else {
        return Ok(());
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_thread_level(LevelFilter::Off)
        .build();
    WriteLogger::init(args.log_level, config, file).context("logger already initialized")?;
    Ok(())
}

use std::io;
use thiserror::Error;

/// Errors that abandon the current input line.
///
/// None of these end the interactive loop; the interpreter reports them and prompts again.
#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Redirection operator provided without filename")]
    MissingRedirectionFilename { operator: String },

    #[error("Error opening file for redirection: {path}: {source}")]
    FileOpen { path: String, source: io::Error },

    #[error("{name}: {source}")]
    Spawn { name: String, source: io::Error },

    #[error("terminal error: {0}")]
    Terminal(#[source] io::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type ShellResult<T> = Result<T, ShellError>;

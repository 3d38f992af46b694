//! A small interactive command interpreter.
//!
//! A line is read from a raw-mode terminal by [`editor::LineEditor`], which also offers
//! tab completion of builtin and `PATH` command names. The committed line is split into
//! words by [`lexer`], output redirections are pulled out by [`parser`], and the
//! [`Interpreter`] runs the command as a builtin or as an external program found on `PATH`.
//!
//! The filesystem is only reached through [`external::ExecutableLookup`], so everything
//! above the process and terminal boundary can be exercised with in-memory listings.

mod builtin;
pub mod command;
pub mod completion;
pub mod config;
pub mod editor;
pub mod env;
pub mod errors;
pub mod external;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod terminal;

pub use builtin::BuiltinKind;
/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{INTERRUPTED_STATUS, Interpreter};

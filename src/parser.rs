//! Extraction of output redirections from a tokenized command line.

use crate::errors::{ShellError, ShellResult};

/// Kind of redirection
///
/// Defines how the target file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `>`, `1>`, `2>`: the file is created or truncated.
    Truncate,
    /// `>>`, `1>>`, `2>>`: the file is created if missing and written at its end.
    Append,
}

/// The standard stream a redirection applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Stdout,
    Stderr,
}

/// A single redirection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub target: String,
    pub kind: RedirectKind,
}

/// Parsed redirections of one command line. `None` means the inherited stream is used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectionSpec {
    pub stdout: Option<Redirect>,
    pub stderr: Option<Redirect>,
}

impl RedirectionSpec {
    /// Records a redirection for `stream`, replacing an earlier one for the same stream.
    fn set(&mut self, stream: StdStream, redirect: Redirect) {
        match stream {
            StdStream::Stdout => self.stdout = Some(redirect),
            StdStream::Stderr => self.stderr = Some(redirect),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stdout.is_none() && self.stderr.is_none()
    }
}

/// Maps a whole token to the redirection operator it spells, if any.
fn classify_operator(token: &str) -> Option<(StdStream, RedirectKind)> {
    match token {
        ">" | "1>" => Some((StdStream::Stdout, RedirectKind::Truncate)),
        ">>" | "1>>" => Some((StdStream::Stdout, RedirectKind::Append)),
        "2>" => Some((StdStream::Stderr, RedirectKind::Truncate)),
        "2>>" => Some((StdStream::Stderr, RedirectKind::Append)),
        _ => None,
    }
}

struct RedirectExtractor {
    tokens: Vec<String>,
    pos: usize,
}

impl RedirectExtractor {
    fn from(tokens: Vec<String>) -> Self {
        RedirectExtractor { tokens, pos: 0 }
    }

    fn consume(&mut self) -> Option<String> {
        let token = self.tokens.get_mut(self.pos).map(std::mem::take);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn extract(mut self) -> ShellResult<(Vec<String>, RedirectionSpec)> {
        let mut argv = Vec::with_capacity(self.tokens.len());
        let mut spec = RedirectionSpec::default();

        while let Some(token) = self.consume() {
            match classify_operator(&token) {
                Some((stream, kind)) => {
                    let target = self
                        .consume()
                        .ok_or(ShellError::MissingRedirectionFilename { operator: token })?;
                    spec.set(stream, Redirect { target, kind });
                }
                None => argv.push(token),
            }
        }

        Ok((argv, spec))
    }
}

/// Removes every redirection operator and its filename from `tokens`.
///
/// Operators are recognised only as whole tokens and may appear anywhere, in any order.
/// When the same stream is redirected twice the later redirection wins. An operator without
/// a following token fails the whole line with [`ShellError::MissingRedirectionFilename`].
pub fn extract_redirections(tokens: Vec<String>) -> ShellResult<(Vec<String>, RedirectionSpec)> {
    RedirectExtractor::from(tokens).extract()
}

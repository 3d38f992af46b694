//! Interactive line editor
//!
//! A byte-at-a-time state machine for reading one command line from a terminal in raw mode.
//! The terminal does not echo, so the editor writes every visible change itself. All state
//! lives in [`LineEditor`], which makes the editor testable by feeding synthetic keystrokes
//! and inspecting the buffer and the bytes written to the display.

use crate::completion::{self, CandidateSource, Completion};
use std::io::{self, Read, Write};

/// Prompt printed at the start of every read.
pub const PROMPT: &str = "$ ";

/// Return to column 0 and clear the line.
const CLEAR_LINE: &str = "\r\x1b[K";
const BELL: &[u8] = b"\x07";
const ERASE_CHAR: &[u8] = b"\x08 \x08";
const NEWLINE: &[u8] = b"\r\n";

/// Key decoded from a single input byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Tab,
    Backspace,
    /// Ctrl-C
    Interrupt,
    /// Ctrl-D
    EndOfInput,
    Escape,
    /// Printable ASCII or part of a UTF-8 sequence.
    Data(u8),
    /// Any other control byte.
    Ignored,
}

impl Key {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'\r' | b'\n' => Key::Enter,
            b'\t' => Key::Tab,
            0x7F | 0x08 => Key::Backspace,
            0x03 => Key::Interrupt,
            0x04 => Key::EndOfInput,
            0x1B => Key::Escape,
            b if b >= 0x20 => Key::Data(b),
            _ => Key::Ignored,
        }
    }
}

/// Outcome from applying a byte to the editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Still reading.
    Pending,
    /// Enter was pressed; holds the trimmed line.
    Committed(String),
    /// Ctrl-C was pressed.
    Aborted,
    /// Ctrl-D on an empty line, or the input stream ended.
    EndOfInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscapeState {
    None,
    Started,
    Sequence,
}

/// Line editor state: the in-progress line plus the bookkeeping for Tab and escapes.
#[derive(Debug)]
pub struct LineEditor {
    buffer: String,
    /// Bytes of a UTF-8 character that is not complete yet.
    pending: Vec<u8>,
    /// Consecutive Tab presses on an ambiguous prefix.
    tab_presses: u8,
    escape: EscapeState,
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl LineEditor {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            pending: Vec::new(),
            tab_presses: 0,
            escape: EscapeState::None,
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.pending.clear();
        self.tab_presses = 0;
        self.escape = EscapeState::None;
    }

    /// Read keystrokes from `input` until the line is committed, aborted, or input ends.
    ///
    /// Bytes are pulled one at a time so nothing beyond the committed line is consumed.
    pub fn read_line(
        &mut self,
        input: &mut dyn Read,
        source: &dyn CandidateSource,
        out: &mut dyn Write,
    ) -> io::Result<EditOutcome> {
        self.reset();
        self.redraw(out)?;
        out.flush()?;

        let mut byte = [0u8; 1];
        loop {
            match input.read(&mut byte) {
                Ok(0) => return self.finish_at_end_of_input(out),
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            let outcome = self.apply_byte(byte[0], source, out)?;
            out.flush()?;
            if outcome != EditOutcome::Pending {
                return Ok(outcome);
            }
        }
    }

    fn finish_at_end_of_input(&mut self, out: &mut dyn Write) -> io::Result<EditOutcome> {
        let line = self.buffer.trim().to_string();
        self.reset();
        out.write_all(NEWLINE)?;
        out.flush()?;
        if line.is_empty() {
            Ok(EditOutcome::EndOfInput)
        } else {
            Ok(EditOutcome::Committed(line))
        }
    }

    /// Apply one input byte and return the outcome
    pub fn apply_byte(
        &mut self,
        byte: u8,
        source: &dyn CandidateSource,
        out: &mut dyn Write,
    ) -> io::Result<EditOutcome> {
        if self.consume_escape(byte) {
            return Ok(EditOutcome::Pending);
        }

        let key = Key::from_byte(byte);
        if key != Key::Tab {
            self.tab_presses = 0;
        }
        if !matches!(key, Key::Data(_)) {
            self.pending.clear();
        }

        match key {
            Key::Enter => {
                out.write_all(NEWLINE)?;
                let line = self.buffer.trim().to_string();
                self.reset();
                return Ok(EditOutcome::Committed(line));
            }
            Key::Interrupt => {
                out.write_all(NEWLINE)?;
                self.reset();
                return Ok(EditOutcome::Aborted);
            }
            Key::EndOfInput if self.buffer.is_empty() => {
                out.write_all(NEWLINE)?;
                self.reset();
                return Ok(EditOutcome::EndOfInput);
            }
            Key::Tab => self.complete(source, out)?,
            Key::Backspace => {
                if self.buffer.pop().is_some() {
                    out.write_all(ERASE_CHAR)?;
                }
            }
            Key::Escape => self.escape = EscapeState::Started,
            Key::Data(b) => self.push_byte(b, out)?,
            Key::EndOfInput | Key::Ignored => {}
        }
        Ok(EditOutcome::Pending)
    }

    /// Swallow the bytes of an escape sequence such as an arrow key (`ESC [ A`).
    ///
    /// Enter, Ctrl-C and Ctrl-D always end the sequence and are handled as keys.
    fn consume_escape(&mut self, byte: u8) -> bool {
        if self.escape == EscapeState::None {
            return false;
        }
        if matches!(
            Key::from_byte(byte),
            Key::Enter | Key::Interrupt | Key::EndOfInput
        ) {
            self.escape = EscapeState::None;
            return false;
        }

        match self.escape {
            EscapeState::None => false,
            EscapeState::Started if byte == b'[' || byte == b'O' => {
                self.escape = EscapeState::Sequence;
                true
            }
            EscapeState::Started => {
                self.escape = EscapeState::None;
                false
            }
            EscapeState::Sequence => {
                if (0x40..=0x7E).contains(&byte) {
                    self.escape = EscapeState::None;
                }
                true
            }
        }
    }

    fn push_byte(&mut self, byte: u8, out: &mut dyn Write) -> io::Result<()> {
        self.pending.push(byte);
        match std::str::from_utf8(&self.pending) {
            Ok(ch) => {
                out.write_all(ch.as_bytes())?;
                self.buffer.push_str(ch);
                self.pending.clear();
            }
            // Invalid sequence: drop it.
            Err(e) if e.error_len().is_some() => self.pending.clear(),
            Err(_) => {}
        }
        Ok(())
    }

    fn complete(&mut self, source: &dyn CandidateSource, out: &mut dyn Write) -> io::Result<()> {
        match completion::complete(source, &self.buffer) {
            Completion::NoMatch => {
                self.tab_presses = 0;
                out.write_all(BELL)
            }
            Completion::Unique(candidate) => {
                self.tab_presses = 0;
                self.buffer = candidate;
                self.buffer.push(' ');
                self.redraw(out)
            }
            Completion::Extend(common) => {
                self.tab_presses = 0;
                self.buffer = common;
                self.redraw(out)
            }
            Completion::Ambiguous(candidates) => {
                self.tab_presses = self.tab_presses.saturating_add(1);
                if self.tab_presses == 1 {
                    return out.write_all(BELL);
                }
                out.write_all(NEWLINE)?;
                out.write_all(candidates.join("  ").as_bytes())?;
                out.write_all(NEWLINE)?;
                self.redraw(out)
            }
        }
    }

    fn redraw(&self, out: &mut dyn Write) -> io::Result<()> {
        write!(out, "{CLEAR_LINE}{PROMPT}{}", self.buffer)
    }
}

//! Raw terminal mode and output translation for it.

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::{error, warn};
use std::io::{self, IsTerminal, Write};

/// Holds the terminal in raw mode for as long as it lives.
///
/// Acquired once at startup; dropping it restores the previous terminal configuration, so
/// every exit path that unwinds through `main` leaves the terminal usable.
#[derive(Debug)]
pub struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    /// Switch the terminal to raw mode if `wanted` and standard input is a terminal.
    ///
    /// Failure is not fatal: the guard stays inactive and input is read as it arrives.
    pub fn acquire(wanted: bool) -> Self {
        if !wanted {
            return Self { active: false };
        }
        if !io::stdin().is_terminal() {
            warn!("standard input is not a terminal, raw mode disabled");
            return Self { active: false };
        }
        match enable_raw_mode() {
            Ok(()) => Self { active: true },
            Err(e) => {
                warn!("cannot enable raw mode: {e}");
                Self { active: false }
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = disable_raw_mode() {
                error!("cannot restore terminal mode: {e}");
            }
        }
    }
}

/// Writer translating `\n` into `\r\n`.
///
/// Raw mode turns off output post-processing, so text written to the terminal needs an
/// explicit carriage return to start the next line at column 0.
pub struct CrlfWriter<W: Write> {
    inner: W,
}

impl<W: Write> CrlfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut start = 0;
        for (i, &byte) in buf.iter().enumerate() {
            if byte == b'\n' {
                self.inner.write_all(&buf[start..i])?;
                self.inner.write_all(b"\r\n")?;
                start = i + 1;
            }
        }
        self.inner.write_all(&buf[start..])?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

//! Character-device transport for a bus exposed as a serial-style console
//! (for example a virtio console at `/dev/hvc0`).
//!
//! # Platform
//!
//! This module is only available on Unix.

#![cfg(unix)]

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use nix::sys::termios::{self, FlushArg, SetArg, SpecialCharacterIndices};

/// A bus endpoint opened as a character device.
#[derive(Debug)]
pub struct SerialTransport {
    /// The opened device file.
    file: File,
    /// Whether the file is a terminal we configured.
    tty: bool,
    /// Read timeout enforced by the line discipline, if any.
    timeout: Option<Duration>,
}

impl SerialTransport {
    /// Opens `path` for reading and writing without making it the
    /// controlling terminal.
    ///
    /// When the file is a terminal and `raw` is set, the line is switched to
    /// raw mode and pending input is discarded. A `timeout` is applied via
    /// `VTIME`; plain files and pipes ignore it.
    pub fn open(path: impl AsRef<Path>, raw: bool, timeout: Option<Duration>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(path)?;

        let tty = raw && file.is_terminal();
        if tty {
            configure_raw(&file, timeout)?;
        } else if timeout.is_some() {
            tracing::debug!(path = %path.display(), "not a terminal; read timeout ignored");
        }

        Ok(Self { file, tty, timeout })
    }
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.file.read(buf)?;
        // With VMIN=0 a zero-length read on a terminal means VTIME expired.
        if n == 0 && self.tty && !buf.is_empty() {
            if let Some(timeout) = self.timeout {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no data from bus within {timeout:?}"),
                ));
            }
        }
        Ok(n)
    }
}

impl Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Puts the terminal into raw mode and applies the read timeout.
fn configure_raw(file: &File, timeout: Option<Duration>) -> io::Result<()> {
    let mut tio = termios::tcgetattr(file)?;
    termios::cfmakeraw(&mut tio);

    let (vmin, vtime) = timeout.map_or((1, 0), |t| (0, deciseconds(t)));
    tio.control_chars[SpecialCharacterIndices::VMIN as usize] = vmin;
    tio.control_chars[SpecialCharacterIndices::VTIME as usize] = vtime;

    termios::tcsetattr(file, SetArg::TCSANOW, &tio)?;
    termios::tcflush(file, FlushArg::TCIFLUSH)?;
    Ok(())
}

/// Converts a timeout to `VTIME` units (tenths of a second, 1..=255).
fn deciseconds(timeout: Duration) -> u8 {
    u8::try_from(timeout.as_millis().div_ceil(100))
        .unwrap_or(u8::MAX)
        .max(1)
}

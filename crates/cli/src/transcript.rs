// BlueRelay - UART Bluetooth Bridge
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::Path;

/// Upper bound for a single channel transcript on disk.
pub const MAX_TRANSCRIPT_BYTES: u64 = 1024 * 1024;

/// Writer that stops passing bytes through once `max_bytes` have been written.
/// Later writes still report success so callers don't have to special-case it.
pub struct TranscriptWriter<W: Write> {
    inner: W,
    bytes_written: u64,
    max_bytes: u64,
    limit_exceeded: bool,
}

impl<W: Write> TranscriptWriter<W> {
    pub fn new(inner: W, max_bytes: u64) -> Self {
        Self {
            inner,
            bytes_written: 0,
            max_bytes,
            limit_exceeded: false,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// True once anything had to be dropped.
    pub fn limit_exceeded(&self) -> bool {
        self.limit_exceeded
    }
}

impl<W: Write> Write for TranscriptWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.limit_exceeded {
            return Ok(buf.len());
        }

        let remaining = self.max_bytes.saturating_sub(self.bytes_written);
        let to_write = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        if to_write == 0 {
            self.limit_exceeded = !buf.is_empty();
            return Ok(buf.len());
        }

        let written = self.inner.write(&buf[..to_write])?;
        self.bytes_written += written as u64;
        if written < to_write {
            return Ok(written);
        }
        if to_write < buf.len() {
            self.limit_exceeded = true;
            return Ok(buf.len());
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Write one channel's raw output to `path`. Returns true if it was cut short.
pub fn write_transcript(path: &Path, bytes: &[u8]) -> io::Result<bool> {
    let file = std::fs::File::create(path)?;
    let mut writer = TranscriptWriter::new(io::BufWriter::new(file), MAX_TRANSCRIPT_BYTES);
    writer.write_all(bytes)?;
    writer.flush()?;
    tracing::debug!("{:?}: {} bytes", path, writer.bytes_written());
    Ok(writer.limit_exceeded())
}

/// Printable rendering of line traffic: CR, LF, tab and backslash as escapes,
/// other non-printable bytes as `\xNN`.
pub fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\r' => out.push_str("\\r"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{:02x}", b);
            }
        }
    }
    out
}

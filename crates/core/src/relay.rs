// BlueRelay - UART Bluetooth Bridge
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::buffer::LineBuffer;
use crate::{Channel, RelayError, RelayResult, DEFAULT_CAPACITY, LINE_TERMINATOR};

const CRLF: &[u8] = b"\r\n";

/// What to do when a line fills the buffer before a terminator arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Forward what was collected as a truncated line and keep going.
    #[default]
    FlushTruncated,
    /// Drop the line and everything up to the next terminator.
    DiscardUntilTerminator,
}

/// Framing of forwarded lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    /// Payload, the received carriage return, then the appended line feed.
    #[default]
    CrLf,
    /// Payload then line feed; the carriage return is replaced.
    Lf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Retransmit every received byte on the channel it arrived on.
    pub echo: bool,
    pub overflow: OverflowPolicy,
    pub line_ending: LineEnding,
}

impl RelayConfig {
    /// Relay reading the operator's terminal: echoes keystrokes.
    pub const fn host() -> Self {
        Self {
            echo: true,
            overflow: OverflowPolicy::FlushTruncated,
            line_ending: LineEnding::CrLf,
        }
    }

    /// Relay reading the Bluetooth module: forwards responses silently.
    pub const fn module() -> Self {
        Self {
            echo: false,
            overflow: OverflowPolicy::FlushTruncated,
            line_ending: LineEnding::CrLf,
        }
    }

    pub const fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub const fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::module()
    }
}

/// Outcome of feeding one byte to a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEvent {
    /// Byte stored; line still open.
    Buffered,
    /// A line of `len` bytes (including the line ending) went to the peer.
    Forwarded { len: usize },
    /// Byte thrown away while waiting for a terminator after an overflow.
    Dropped,
    /// Terminator seen after an overflow; collection starts over.
    Resynchronized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayStats {
    pub bytes_received: u32,
    pub lines_forwarded: u32,
    pub bytes_forwarded: u32,
    pub overflows: u32,
    pub dropped_bytes: u32,
    pub transmit_faults: u32,
}

impl RelayStats {
    pub const fn new() -> Self {
        Self {
            bytes_received: 0,
            lines_forwarded: 0,
            bytes_forwarded: 0,
            overflows: 0,
            dropped_bytes: 0,
            transmit_faults: 0,
        }
    }
}

/// Line-buffering state machine for one direction of the bridge.
#[derive(Debug, Clone)]
pub struct LineRelay<S = [u8; DEFAULT_CAPACITY]> {
    config: RelayConfig,
    buffer: LineBuffer<S>,
    discarding: bool,
    stats: RelayStats,
}

impl LineRelay {
    /// Relay with the default 32-byte buffer.
    pub const fn with_config(config: RelayConfig) -> Self {
        Self::new(config, LineBuffer::zeroed())
    }
}

impl<S> LineRelay<S> {
    pub const fn new(config: RelayConfig, buffer: LineBuffer<S>) -> Self {
        Self {
            config,
            buffer,
            discarding: false,
            stats: RelayStats::new(),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    pub fn buffer(&self) -> &LineBuffer<S> {
        &self.buffer
    }

    /// True while bytes are being dropped after an overflow.
    pub fn is_discarding(&self) -> bool {
        self.discarding
    }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> LineRelay<S> {
    /// Handle one received byte.
    ///
    /// `own` is the channel the byte arrived on (echo target), `peer` receives
    /// completed lines. Buffer bookkeeping always completes; a transmit fault is
    /// reported after the fact and the affected bytes are lost. Overflows are
    /// reported as [`RelayError::LineOverflow`] once the configured policy has
    /// been applied, even when a transmit fault hit the same byte; the fault
    /// is still counted in [`RelayStats::transmit_faults`].
    pub fn on_byte<O, P>(&mut self, byte: u8, own: &mut O, peer: &mut P) -> RelayResult<RelayEvent>
    where
        O: Channel + ?Sized,
        P: Channel + ?Sized,
    {
        self.stats.bytes_received = self.stats.bytes_received.wrapping_add(1);
        let mut fault = None;
        tracing::trace!(byte, cursor = self.buffer.len(), "rx");

        if self.config.echo {
            self.note(&mut fault, own.send_byte(byte));
        }

        let outcome = if self.discarding {
            self.skip(byte, own, &mut fault)
        } else if self.buffer.is_full() {
            self.overflow(byte, own, peer, &mut fault)
        } else {
            self.collect(byte, own, peer, &mut fault)
        };

        match (outcome, fault) {
            (Err(overflow @ RelayError::LineOverflow { .. }), _) => Err(overflow),
            (outcome, None) => outcome,
            (_, Some(err)) => Err(err),
        }
    }

    /// Drop the open line and forget any pending discard state.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    fn collect<O, P>(
        &mut self,
        byte: u8,
        own: &mut O,
        peer: &mut P,
        fault: &mut Option<RelayError>,
    ) -> RelayResult<RelayEvent>
    where
        O: Channel + ?Sized,
        P: Channel + ?Sized,
    {
        self.buffer.push(byte)?;
        if byte != LINE_TERMINATOR {
            return Ok(RelayEvent::Buffered);
        }
        self.echo_line_break(own, fault);
        let len = self.flush(peer, fault);
        Ok(RelayEvent::Forwarded { len })
    }

    fn overflow<O, P>(
        &mut self,
        byte: u8,
        own: &mut O,
        peer: &mut P,
        fault: &mut Option<RelayError>,
    ) -> RelayResult<RelayEvent>
    where
        O: Channel + ?Sized,
        P: Channel + ?Sized,
    {
        let capacity = self.buffer.capacity();
        self.stats.overflows = self.stats.overflows.wrapping_add(1);
        tracing::warn!(capacity, policy = ?self.config.overflow, "line overflow");

        match self.config.overflow {
            OverflowPolicy::FlushTruncated => {
                if byte == LINE_TERMINATOR {
                    self.echo_line_break(own, fault);
                }
                self.flush(peer, fault);
                if byte != LINE_TERMINATOR {
                    // Starts the next line; the buffer was just cleared.
                    self.buffer.push(byte)?;
                }
            }
            OverflowPolicy::DiscardUntilTerminator => {
                let dropped = self.buffer.len() as u32 + 1;
                self.stats.dropped_bytes = self.stats.dropped_bytes.wrapping_add(dropped);
                self.buffer.clear();
                if byte == LINE_TERMINATOR {
                    self.echo_line_break(own, fault);
                } else {
                    self.discarding = true;
                }
            }
        }
        Err(RelayError::LineOverflow { capacity })
    }

    fn skip<O>(
        &mut self,
        byte: u8,
        own: &mut O,
        fault: &mut Option<RelayError>,
    ) -> RelayResult<RelayEvent>
    where
        O: Channel + ?Sized,
    {
        self.stats.dropped_bytes = self.stats.dropped_bytes.wrapping_add(1);
        if byte != LINE_TERMINATOR {
            return Ok(RelayEvent::Dropped);
        }
        self.echo_line_break(own, fault);
        self.discarding = false;
        tracing::debug!("resynchronized on terminator");
        Ok(RelayEvent::Resynchronized)
    }

    fn echo_line_break<O>(&mut self, own: &mut O, fault: &mut Option<RelayError>)
    where
        O: Channel + ?Sized,
    {
        if self.config.echo {
            let sent = own.send_bytes(CRLF);
            self.note(fault, sent);
        }
    }

    /// Seal the open line, send it to `peer` and clear the buffer.
    fn flush<P>(&mut self, peer: &mut P, fault: &mut Option<RelayError>) -> usize
    where
        P: Channel + ?Sized,
    {
        let line = self.buffer.seal(self.config.line_ending);
        let len = line.len();
        let sent = peer.send_bytes(line);
        self.buffer.clear();

        if sent.is_ok() {
            self.stats.lines_forwarded = self.stats.lines_forwarded.wrapping_add(1);
            self.stats.bytes_forwarded = self.stats.bytes_forwarded.wrapping_add(len as u32);
            tracing::debug!(len, "line forwarded");
        }
        self.note(fault, sent);
        len
    }

    fn note(&mut self, fault: &mut Option<RelayError>, result: RelayResult<()>) {
        if let Err(err) = result {
            self.stats.transmit_faults = self.stats.transmit_faults.wrapping_add(1);
            tracing::warn!(%err, "transmit fault");
            fault.get_or_insert(err);
        }
    }
}

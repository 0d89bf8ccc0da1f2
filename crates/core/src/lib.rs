// BlueRelay - UART Bluetooth Bridge
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Hardware-free core of the BlueRelay UART bridge.
//!
//! Everything here is driven by two inputs: a byte that arrived on a channel and
//! a capability to transmit bytes. Register access lives behind [`SerialPort`],
//! so the relay state machines can be exercised on the host without hardware.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(all(test, not(feature = "std")))]
#[macro_use]
extern crate std;

pub mod bridge;
pub mod buffer;
pub mod relay;
#[cfg(feature = "std")]
pub mod sim;
pub mod transmit;

pub use bridge::Bridge;
pub use buffer::LineBuffer;
pub use relay::{LineEnding, LineRelay, OverflowPolicy, RelayConfig, RelayEvent, RelayStats};
#[cfg(feature = "std")]
pub use sim::SimulatedPort;
pub use transmit::{PolledChannel, SerialPort, TxWait};

/// Buffer capacity used by the firmware for each relay.
pub const DEFAULT_CAPACITY: usize = 32;

/// Byte that ends a line on the receive side.
pub const LINE_TERMINATOR: u8 = b'\r';

/// Byte appended to every forwarded line.
pub const LINE_FEED: u8 = b'\n';

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("line exceeded buffer capacity of {capacity} bytes")]
    LineOverflow { capacity: usize },
    #[error("transmitter not ready after {spins} polls")]
    TransmitTimeout { spins: u32 },
    #[error("line buffer capacity {capacity} is too small (minimum 2)")]
    CapacityTooSmall { capacity: usize },
}

pub type RelayResult<T> = Result<T, RelayError>;

/// Identifies one side of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    /// UART wired to the operator's terminal.
    Host,
    /// UART wired to the Bluetooth serial module.
    Module,
}

impl ChannelId {
    /// The channel a relay reading from `self` forwards to.
    pub fn peer(self) -> Self {
        match self {
            ChannelId::Host => ChannelId::Module,
            ChannelId::Module => ChannelId::Host,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelId::Host => "host",
            ChannelId::Module => "module",
        }
    }
}

impl core::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A serial line as seen by a relay.
///
/// Sends are blocking: `send_byte` returns once the byte has been handed to the
/// transmitter. Only one byte is ever in flight per channel.
pub trait Channel {
    /// Take the byte that triggered the receive event, if one is pending.
    fn receive_byte(&mut self) -> Option<u8>;

    fn send_byte(&mut self, byte: u8) -> RelayResult<()>;

    fn send_bytes(&mut self, bytes: &[u8]) -> RelayResult<()> {
        for &byte in bytes {
            self.send_byte(byte)?;
        }
        Ok(())
    }
}

impl<T: Channel + ?Sized> Channel for &mut T {
    fn receive_byte(&mut self) -> Option<u8> {
        (**self).receive_byte()
    }

    fn send_byte(&mut self, byte: u8) -> RelayResult<()> {
        (**self).send_byte(byte)
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> RelayResult<()> {
        (**self).send_bytes(bytes)
    }
}

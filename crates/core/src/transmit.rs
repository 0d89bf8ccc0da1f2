// BlueRelay - UART Bluetooth Bridge
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{Channel, RelayError, RelayResult};

/// Register-level view of one UART.
///
/// Implementations map these onto the status flags and data register of a
/// concrete peripheral. Nothing here blocks.
pub trait SerialPort {
    /// Transmit data register can take another byte.
    fn tx_ready(&self) -> bool;
    fn write_tx(&mut self, byte: u8);
    /// A received byte is waiting in the data register.
    fn rx_ready(&self) -> bool;
    fn read_rx(&mut self) -> u8;
}

impl<T: SerialPort + ?Sized> SerialPort for &mut T {
    fn tx_ready(&self) -> bool {
        (**self).tx_ready()
    }

    fn write_tx(&mut self, byte: u8) {
        (**self).write_tx(byte)
    }

    fn rx_ready(&self) -> bool {
        (**self).rx_ready()
    }

    fn read_rx(&mut self) -> u8 {
        (**self).read_rx()
    }
}

/// How long a send may wait for the transmitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxWait {
    /// Spin until ready, however long that takes.
    #[default]
    Unbounded,
    /// Give up with [`RelayError::TransmitTimeout`] after this many polls.
    Spins(u32),
}

/// [`Channel`] over a [`SerialPort`] with busy-wait transmit.
#[derive(Debug)]
pub struct PolledChannel<P> {
    port: P,
    wait: TxWait,
}

impl<P> PolledChannel<P> {
    pub const fn new(port: P, wait: TxWait) -> Self {
        Self { port, wait }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn wait(&self) -> TxWait {
        self.wait
    }

    pub fn into_port(self) -> P {
        self.port
    }
}

impl<P: SerialPort> PolledChannel<P> {
    fn wait_tx_ready(&self) -> RelayResult<()> {
        match self.wait {
            TxWait::Unbounded => {
                while !self.port.tx_ready() {
                    core::hint::spin_loop();
                }
                Ok(())
            }
            TxWait::Spins(spins) => {
                for _ in 0..spins {
                    if self.port.tx_ready() {
                        return Ok(());
                    }
                    core::hint::spin_loop();
                }
                Err(RelayError::TransmitTimeout { spins })
            }
        }
    }
}

impl<P: SerialPort> Channel for PolledChannel<P> {
    fn receive_byte(&mut self) -> Option<u8> {
        if self.port.rx_ready() {
            Some(self.port.read_rx())
        } else {
            None
        }
    }

    fn send_byte(&mut self, byte: u8) -> RelayResult<()> {
        self.wait_tx_ready()?;
        self.port.write_tx(byte);
        Ok(())
    }
}

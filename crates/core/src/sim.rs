// BlueRelay - UART Bluetooth Bridge
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SerialPort;
use std::collections::VecDeque;

/// In-memory UART used for host-side runs.
///
/// Injected bytes show up as pending receive data one at a time; transmitted
/// bytes are captured in order.
#[derive(Debug, Default, Clone)]
pub struct SimulatedPort {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    stall_after: Option<usize>,
}

impl SimulatedPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if they arrived on the line.
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    pub fn pending_rx(&self) -> usize {
        self.rx.len()
    }

    pub fn transmitted(&self) -> &[u8] {
        &self.tx
    }

    pub fn take_transmitted(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx)
    }

    /// Stop reporting transmit-ready once `limit` bytes have been sent.
    pub fn stall_after(&mut self, limit: Option<usize>) {
        self.stall_after = limit;
    }
}

impl SerialPort for SimulatedPort {
    fn tx_ready(&self) -> bool {
        self.stall_after.is_none_or(|limit| self.tx.len() < limit)
    }

    fn write_tx(&mut self, byte: u8) {
        self.tx.push(byte);
    }

    fn rx_ready(&self) -> bool {
        !self.rx.is_empty()
    }

    fn read_rx(&mut self) -> u8 {
        self.rx.pop_front().unwrap_or(0)
    }
}

// BlueRelay - UART Bluetooth Bridge
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::relay::LineEnding;
use crate::{RelayError, RelayResult, DEFAULT_CAPACITY, LINE_FEED, LINE_TERMINATOR};

/// Fixed-capacity scratch area for one line.
///
/// The last slot is reserved for the line feed appended when a line is sealed,
/// so at most `capacity - 1` bytes are ever collected and `cursor` never
/// exceeds `capacity - 1`.
#[derive(Debug, Clone)]
pub struct LineBuffer<S = [u8; DEFAULT_CAPACITY]> {
    storage: S,
    cursor: usize,
}

impl<const N: usize> LineBuffer<[u8; N]> {
    pub const fn zeroed() -> Self {
        const {
            assert!(N >= 2, "line buffer needs room for a byte and the line feed");
        }
        Self {
            storage: [0; N],
            cursor: 0,
        }
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> LineBuffer<S> {
    pub fn new(mut storage: S) -> RelayResult<Self> {
        let capacity = storage.as_ref().len();
        if capacity < 2 {
            return Err(RelayError::CapacityTooSmall { capacity });
        }
        storage.as_mut().fill(0);
        Ok(Self { storage, cursor: 0 })
    }

    pub fn capacity(&self) -> usize {
        self.storage.as_ref().len()
    }

    /// Number of collected bytes (the write cursor).
    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// True when only the line-feed slot is left.
    pub fn is_full(&self) -> bool {
        self.cursor >= self.capacity() - 1
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.storage.as_ref()[..self.cursor]
    }

    /// Raw storage, including bytes past the cursor.
    pub fn raw(&self) -> &[u8] {
        self.storage.as_ref()
    }

    pub fn push(&mut self, byte: u8) -> RelayResult<()> {
        if self.is_full() {
            return Err(RelayError::LineOverflow {
                capacity: self.capacity(),
            });
        }
        let cursor = self.cursor;
        self.storage.as_mut()[cursor] = byte;
        self.cursor += 1;
        Ok(())
    }

    /// Append the line feed and return the bytes to forward.
    ///
    /// With [`LineEnding::CrLf`] the line feed goes into `buffer[cursor]`, one
    /// slot past the stored terminator, without advancing the cursor. With
    /// [`LineEnding::Lf`] a trailing carriage return is overwritten instead.
    pub fn seal(&mut self, ending: LineEnding) -> &[u8] {
        let cursor = self.cursor;
        let buf = self.storage.as_mut();
        if ending == LineEnding::Lf && cursor > 0 && buf[cursor - 1] == LINE_TERMINATOR {
            buf[cursor - 1] = LINE_FEED;
            &buf[..cursor]
        } else {
            buf[cursor] = LINE_FEED;
            &buf[..=cursor]
        }
    }

    /// Zero the whole buffer and rewind the cursor.
    pub fn clear(&mut self) {
        self.storage.as_mut().fill(0);
        self.cursor = 0;
    }
}

// BlueRelay - UART Bluetooth Bridge
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Register-level access to the two USARTs.
//!
//! The ports are zero-sized: each interrupt handler builds its own pair on
//! the stack. The HAL `Serial` objects configure the peripherals once in
//! `main`; after that only these status/data register accesses happen.

use bluerelay_core::SerialPort;
use stm32f1xx_hal::pac;

macro_rules! usart_port {
    ($(#[$meta:meta])* $name:ident, $USART:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl SerialPort for $name {
            fn tx_ready(&self) -> bool {
                // SAFETY: read of the status register, no side effects.
                unsafe { (*<$USART>::ptr()).sr.read().txe().bit_is_set() }
            }

            fn write_tx(&mut self, byte: u8) {
                // SAFETY: both USART handlers run at the same priority, so a
                // data register write is never interleaved with another.
                unsafe { (*<$USART>::ptr()).dr.write(|w| w.dr().bits(byte as u16)) }
            }

            fn rx_ready(&self) -> bool {
                // SAFETY: read of the status register, no side effects.
                unsafe { (*<$USART>::ptr()).sr.read().rxne().bit_is_set() }
            }

            fn read_rx(&mut self) -> u8 {
                // SAFETY: reading DR clears RXNE; only the owning handler reads it.
                unsafe { (*<$USART>::ptr()).dr.read().dr().bits() as u8 }
            }
        }
    };
}

usart_port!(
    /// USART1, PA9/PA10: the operator's terminal.
    HostPort,
    pac::USART1
);
usart_port!(
    /// USART2, PA2/PA3: the HC-05 module.
    ModulePort,
    pac::USART2
);

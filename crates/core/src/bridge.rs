// BlueRelay - UART Bluetooth Bridge
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::relay::{LineRelay, RelayEvent};
use crate::{Channel, ChannelId, RelayResult, DEFAULT_CAPACITY};

/// Both relays and both channels in one place.
///
/// Stands in for the interrupt vector on the host: each call to
/// [`Bridge::service`] is one receive interrupt on the given channel. The
/// host relay reads `host` and forwards to `module`; the module relay is the
/// mirror image.
#[derive(Debug)]
pub struct Bridge<H, M, S = [u8; DEFAULT_CAPACITY]> {
    host: H,
    module: M,
    host_relay: LineRelay<S>,
    module_relay: LineRelay<S>,
}

impl<H, M, S> Bridge<H, M, S>
where
    H: Channel,
    M: Channel,
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    pub fn new(host: H, module: M, host_relay: LineRelay<S>, module_relay: LineRelay<S>) -> Self {
        Self {
            host,
            module,
            host_relay,
            module_relay,
        }
    }

    /// Deliver `byte` as if it arrived on channel `from`.
    pub fn receive(&mut self, from: ChannelId, byte: u8) -> RelayResult<RelayEvent> {
        match from {
            ChannelId::Host => self
                .host_relay
                .on_byte(byte, &mut self.host, &mut self.module),
            ChannelId::Module => self
                .module_relay
                .on_byte(byte, &mut self.module, &mut self.host),
        }
    }

    /// Handle one pending byte on `from`, if any.
    pub fn service(&mut self, from: ChannelId) -> Option<RelayResult<RelayEvent>> {
        let byte = match from {
            ChannelId::Host => self.host.receive_byte(),
            ChannelId::Module => self.module.receive_byte(),
        }?;
        Some(self.receive(from, byte))
    }

    /// Drain every pending byte on both channels, host first, calling
    /// `observe` with each outcome.
    pub fn service_all<F>(&mut self, mut observe: F) -> usize
    where
        F: FnMut(ChannelId, RelayResult<RelayEvent>),
    {
        let mut handled = 0;
        for id in [ChannelId::Host, ChannelId::Module] {
            while let Some(outcome) = self.service(id) {
                observe(id, outcome);
                handled += 1;
            }
        }
        handled
    }

    pub fn relay(&self, id: ChannelId) -> &LineRelay<S> {
        match id {
            ChannelId::Host => &self.host_relay,
            ChannelId::Module => &self.module_relay,
        }
    }

    pub fn relay_mut(&mut self, id: ChannelId) -> &mut LineRelay<S> {
        match id {
            ChannelId::Host => &mut self.host_relay,
            ChannelId::Module => &mut self.module_relay,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut M {
        &mut self.module
    }

    pub fn into_parts(self) -> (H, M, LineRelay<S>, LineRelay<S>) {
        (self.host, self.module, self.host_relay, self.module_relay)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::relay::RelayConfig;
    use crate::{PolledChannel, SimulatedPort, TxWait};

    type SimBridge = Bridge<PolledChannel<SimulatedPort>, PolledChannel<SimulatedPort>>;

    fn bridge() -> SimBridge {
        Bridge::new(
            PolledChannel::new(SimulatedPort::new(), TxWait::Spins(16)),
            PolledChannel::new(SimulatedPort::new(), TxWait::Spins(16)),
            LineRelay::with_config(RelayConfig::host()),
            LineRelay::with_config(RelayConfig::module()),
        )
    }

    #[test]
    fn test_terminal_command_reaches_module() {
        let mut bridge = bridge();
        bridge.host_mut().port_mut().inject(b"AT+VERSION?\r");

        let handled = bridge.service_all(|_, outcome| assert!(outcome.is_ok()));

        assert_eq!(handled, 12);
        assert_eq!(bridge.module().port().transmitted(), b"AT+VERSION?\r\n");
        assert_eq!(bridge.host().port().transmitted(), b"AT+VERSION?\r\r\n");
    }

    #[test]
    fn test_module_reply_reaches_terminal_without_echo() {
        let mut bridge = bridge();
        bridge.module_mut().port_mut().inject(b"OK\r");

        bridge.service_all(|_, _| {});

        assert_eq!(bridge.host().port().transmitted(), b"OK\r\n");
        assert!(bridge.module().port().transmitted().is_empty());
    }

    #[test]
    fn test_directions_are_independent() {
        let mut bridge = bridge();
        bridge.receive(ChannelId::Host, b'A').unwrap();
        bridge.receive(ChannelId::Module, b'O').unwrap();
        bridge.receive(ChannelId::Module, b'K').unwrap();
        bridge.receive(ChannelId::Host, b'T').unwrap();

        assert_eq!(bridge.relay(ChannelId::Host).buffer().as_slice(), b"AT");
        assert_eq!(bridge.relay(ChannelId::Module).buffer().as_slice(), b"OK");
    }

    #[test]
    fn test_service_without_pending_byte() {
        let mut bridge = bridge();
        assert!(bridge.service(ChannelId::Module).is_none());
    }

    #[test]
    fn test_service_takes_one_byte_per_call() {
        let mut bridge = bridge();
        bridge.module_mut().port_mut().inject(b"OK\r");
        assert_eq!(bridge.module().port().pending_rx(), 3);

        assert!(bridge.service(ChannelId::Module).is_some());
        assert_eq!(bridge.module().port().pending_rx(), 2);
        assert_eq!(bridge.relay(ChannelId::Module).buffer().as_slice(), b"O");
    }

    #[test]
    fn test_reset_relay_drops_open_line() {
        let mut bridge = bridge();
        bridge.host_mut().port_mut().inject(b"garbage");
        bridge.service_all(|_, _| {});

        bridge.relay_mut(ChannelId::Host).reset();
        assert!(bridge.relay(ChannelId::Host).buffer().is_empty());

        bridge.host_mut().port_mut().inject(b"AT\r");
        bridge.service_all(|_, _| {});
        assert_eq!(bridge.module().port().transmitted(), b"AT\r\n");
    }

    #[test]
    fn test_stalled_module_reports_timeout() {
        let mut bridge = bridge();
        bridge.module_mut().port_mut().stall_after(Some(0));
        bridge.host_mut().port_mut().inject(b"x\r");

        let mut faults = 0;
        bridge.service_all(|id, outcome| {
            if outcome.is_err() {
                assert_eq!(id, ChannelId::Host);
                faults += 1;
            }
        });

        assert_eq!(faults, 1);
        assert_eq!(bridge.relay(ChannelId::Host).stats().transmit_faults, 1);
        assert!(bridge.relay(ChannelId::Host).buffer().is_empty());
    }
}

// BlueRelay - UART Bluetooth Bridge
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#![cfg(feature = "std")]

use bluerelay_core::{
    Bridge, ChannelId, LineBuffer, LineEnding, LineRelay, OverflowPolicy, PolledChannel,
    RelayConfig, RelayError, SimulatedPort, TxWait, DEFAULT_CAPACITY,
};
use proptest::prelude::*;

type SimChannel = PolledChannel<SimulatedPort>;

fn channel() -> SimChannel {
    PolledChannel::new(SimulatedPort::new(), TxWait::Unbounded)
}

fn sim_bridge(host: RelayConfig, module: RelayConfig) -> Bridge<SimChannel, SimChannel> {
    Bridge::new(
        channel(),
        channel(),
        LineRelay::with_config(host),
        LineRelay::with_config(module),
    )
}

fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>().prop_filter("no terminator", |b| *b != b'\r'), 0..=max_len)
}

proptest! {
    #[test]
    fn unterminated_input_is_never_forwarded(data in payload(DEFAULT_CAPACITY - 1)) {
        let mut bridge = sim_bridge(RelayConfig::host(), RelayConfig::module());
        for &b in &data {
            prop_assert!(bridge.receive(ChannelId::Host, b).is_ok());
        }
        prop_assert!(bridge.module().port().transmitted().is_empty());
        prop_assert_eq!(bridge.relay(ChannelId::Host).buffer().as_slice(), &data[..]);
    }

    #[test]
    fn terminated_line_is_forwarded_with_line_feed(data in payload(DEFAULT_CAPACITY - 2)) {
        let mut bridge = sim_bridge(RelayConfig::module(), RelayConfig::module());
        for &b in data.iter().chain(b"\r") {
            prop_assert!(bridge.receive(ChannelId::Host, b).is_ok());
        }

        let mut expected = data.clone();
        expected.extend_from_slice(b"\r\n");
        prop_assert_eq!(bridge.module().port().transmitted(), &expected[..]);
    }

    #[test]
    fn lf_framing_forwards_payload_plus_line_feed(data in payload(DEFAULT_CAPACITY - 2)) {
        let config = RelayConfig::module().with_line_ending(LineEnding::Lf);
        let mut bridge = sim_bridge(config, config);
        for &b in data.iter().chain(b"\r") {
            prop_assert!(bridge.receive(ChannelId::Module, b).is_ok());
        }

        let mut expected = data.clone();
        expected.push(b'\n');
        prop_assert_eq!(bridge.host().port().transmitted(), &expected[..]);
    }

    #[test]
    fn echo_repeats_every_byte_before_line_break(data in payload(DEFAULT_CAPACITY - 2)) {
        let mut bridge = sim_bridge(RelayConfig::host(), RelayConfig::module());
        for &b in data.iter().chain(b"\r") {
            bridge.receive(ChannelId::Host, b).unwrap();
        }

        let mut expected = data.clone();
        expected.extend_from_slice(b"\r\r\n");
        prop_assert_eq!(bridge.host().port().transmitted(), &expected[..]);
    }

    #[test]
    fn completed_line_leaves_startup_state(data in payload(DEFAULT_CAPACITY - 2)) {
        let mut relay = LineRelay::with_config(RelayConfig::host());
        let (mut own, mut peer) = (channel(), channel());
        for &b in data.iter().chain(b"\r") {
            relay.on_byte(b, &mut own, &mut peer).unwrap();
        }

        let fresh = LineRelay::with_config(RelayConfig::host());
        prop_assert!(relay.buffer().is_empty());
        prop_assert_eq!(relay.buffer().raw(), fresh.buffer().raw());
    }

    #[test]
    fn any_input_stays_in_bounds(
        data in prop::collection::vec(any::<u8>(), 0..256),
        discard in any::<bool>(),
    ) {
        let policy = if discard {
            OverflowPolicy::DiscardUntilTerminator
        } else {
            OverflowPolicy::FlushTruncated
        };
        let config = RelayConfig::host().with_overflow(policy);
        let mut relay = LineRelay::new(config, LineBuffer::<[u8; 8]>::zeroed());
        let (mut own, mut peer) = (channel(), channel());
        for &b in &data {
            match relay.on_byte(b, &mut own, &mut peer) {
                Ok(_) | Err(RelayError::LineOverflow { capacity: 8 }) => {}
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
            prop_assert!(relay.buffer().len() <= 7);
        }
        // Every received byte is echoed exactly once, plus CRLF per terminator.
        let terminators = data.iter().filter(|b| **b == b'\r').count();
        prop_assert_eq!(own.port().transmitted().len(), data.len() + 2 * terminators);
    }
}

#[test]
fn at_command_from_module_reaches_host() {
    let config = RelayConfig::module().with_line_ending(LineEnding::Lf);
    let mut bridge = sim_bridge(RelayConfig::host(), config);
    for &b in b"AT\r" {
        bridge.receive(ChannelId::Module, b).unwrap();
    }
    assert_eq!(bridge.host().port().transmitted(), b"AT\n");
}

#[test]
fn ls_from_terminal_is_echoed_and_forwarded() {
    let mut bridge = sim_bridge(RelayConfig::host(), RelayConfig::module());
    for &b in b"ls\r" {
        bridge.receive(ChannelId::Host, b).unwrap();
    }
    assert_eq!(bridge.host().port().transmitted(), b"ls\r\r\n");
    assert_eq!(bridge.module().port().transmitted(), b"ls\r\n");
}

#[test]
fn full_capacity_without_terminator_flushes_truncated() {
    let mut bridge = sim_bridge(RelayConfig::module(), RelayConfig::module());
    let input = vec![b'x'; DEFAULT_CAPACITY];

    let results: Vec<_> = input
        .iter()
        .map(|&b| bridge.receive(ChannelId::Host, b))
        .collect();

    assert_eq!(
        results[DEFAULT_CAPACITY - 1],
        Err(RelayError::LineOverflow {
            capacity: DEFAULT_CAPACITY
        })
    );
    let mut expected = vec![b'x'; DEFAULT_CAPACITY - 1];
    expected.push(b'\n');
    assert_eq!(bridge.module().port().transmitted(), &expected[..]);
    // The byte that overflowed opened the next line.
    assert_eq!(bridge.relay(ChannelId::Host).buffer().as_slice(), b"x");
}

#[test]
fn full_capacity_without_terminator_discards() {
    let config = RelayConfig::module().with_overflow(OverflowPolicy::DiscardUntilTerminator);
    let mut bridge = sim_bridge(config, RelayConfig::module());
    for _ in 0..DEFAULT_CAPACITY {
        let _ = bridge.receive(ChannelId::Host, b'x');
    }
    assert!(bridge.module().port().transmitted().is_empty());
    assert!(bridge.relay(ChannelId::Host).is_discarding());
    assert_eq!(bridge.relay(ChannelId::Host).stats().overflows, 1);
}

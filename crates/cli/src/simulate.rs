// BlueRelay - UART Bluetooth Bridge
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use bluerelay_config::{BridgeConfig, OutputExpectation, Scenario, ScenarioAssertion};
use bluerelay_core::{
    Bridge, ChannelId, LineBuffer, LineRelay, PolledChannel, RelayEvent, RelayStats,
    SimulatedPort,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::transcript::escape_bytes;

type SimChannel = PolledChannel<SimulatedPort>;
type SimBridge = Bridge<SimChannel, SimChannel, Vec<u8>>;

/// Everything observable after a scenario has been played through the bridge.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub host_tx: Vec<u8>,
    pub module_tx: Vec<u8>,
    pub host_stats: RelayStats,
    pub module_stats: RelayStats,
    pub bytes_handled: usize,
}

impl Outcome {
    /// Bytes the bridge transmitted on `id`.
    pub fn transmitted(&self, id: ChannelId) -> &[u8] {
        match id {
            ChannelId::Host => &self.host_tx,
            ChannelId::Module => &self.module_tx,
        }
    }

    /// Counters of the relay reading `id`.
    pub fn stats(&self, id: ChannelId) -> &RelayStats {
        match id {
            ChannelId::Host => &self.host_stats,
            ChannelId::Module => &self.module_stats,
        }
    }
}

fn build_bridge(config: &BridgeConfig) -> Result<SimBridge> {
    let wait = config.tx_wait();
    let channel = |id: ChannelId| {
        let mut port = SimulatedPort::new();
        port.stall_after(config.channel(id).tx_stall_after);
        PolledChannel::new(port, wait)
    };
    let host = channel(ChannelId::Host);
    let module = channel(ChannelId::Module);

    let relay = |id: ChannelId| -> Result<LineRelay<Vec<u8>>> {
        let buffer = LineBuffer::new(vec![0u8; config.capacity])
            .with_context(|| format!("Failed to allocate {} line buffer", id))?;
        Ok(LineRelay::new(config.relay_config(id), buffer))
    };
    let host_relay = relay(ChannelId::Host)?;
    let module_relay = relay(ChannelId::Module)?;

    let bridge = Bridge::new(host, module, host_relay, module_relay);
    debug!("transmit wait: {:?}", bridge.host().wait());
    for id in [ChannelId::Host, ChannelId::Module] {
        let relay = bridge.relay(id);
        let relay_config = relay.config();
        debug!(
            "{} relay: echo {}, {:?}, {:?}, {} byte buffer",
            id,
            relay_config.echo,
            relay_config.overflow,
            relay_config.line_ending,
            relay.buffer().capacity()
        );
    }
    Ok(bridge)
}

/// Play every step of `scenario` through a simulated bridge.
///
/// Each step's bytes are queued on the channel's receiver and serviced one
/// interrupt at a time until the queue is empty. Relay errors are part of
/// normal operation here; they are logged and show up in the stats.
pub fn run(scenario: &Scenario) -> Result<Outcome> {
    let mut bridge = build_bridge(&scenario.bridge())?;
    let mut bytes_handled = 0;

    for (i, step) in scenario.steps.iter().enumerate() {
        let id = ChannelId::from(step.channel);
        let bytes = step
            .bytes()
            .with_context(|| format!("Invalid step {} ({})", i + 1, id))?;
        let port = match id {
            ChannelId::Host => bridge.host_mut().port_mut(),
            ChannelId::Module => bridge.module_mut().port_mut(),
        };
        port.inject(&bytes);
        debug!(
            "step {}: {} <- \"{}\" ({} pending)",
            i + 1,
            id,
            escape_bytes(&bytes),
            port.pending_rx()
        );
        while let Some(outcome) = bridge.service(id) {
            bytes_handled += 1;
            match outcome {
                Ok(RelayEvent::Forwarded { len }) => {
                    debug!("{} relay forwarded {} bytes to {}", id, len, id.peer())
                }
                Ok(event) => tracing::trace!("{} relay: {:?}", id, event),
                Err(e) => warn!("{} relay: {}", id, e),
            }
        }
    }

    let host_stats = *bridge.relay(ChannelId::Host).stats();
    let module_stats = *bridge.relay(ChannelId::Module).stats();
    let (host, module, _, _) = bridge.into_parts();
    let outcome = Outcome {
        host_tx: host.into_port().take_transmitted(),
        module_tx: module.into_port().take_transmitted(),
        host_stats,
        module_stats,
        bytes_handled,
    };

    info!(
        "Handled {} bytes: host relay forwarded {} lines, module relay forwarded {} lines",
        outcome.bytes_handled, host_stats.lines_forwarded, module_stats.lines_forwarded
    );
    Ok(outcome)
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AssertionResult {
    pub assertion: ScenarioAssertion,
    pub passed: bool,
    /// What was actually seen, recorded for failed assertions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<String>,
}

fn check(passed: bool, observed: impl FnOnce() -> String) -> (bool, Option<String>) {
    if passed {
        (true, None)
    } else {
        (false, Some(observed()))
    }
}

fn check_output(
    expected: &OutputExpectation,
    outcome: &Outcome,
    matches: impl FnOnce(&[u8], &[u8]) -> bool,
) -> (bool, Option<String>) {
    let actual = outcome.transmitted(expected.channel.into());
    match expected.bytes() {
        Ok(wanted) => check(matches(actual, &wanted), || escape_bytes(actual)),
        Err(e) => (false, Some(format!("invalid expectation: {}", e))),
    }
}

pub fn evaluate(assertion: &ScenarioAssertion, outcome: &Outcome) -> AssertionResult {
    let (passed, observed) = match assertion {
        ScenarioAssertion::OutputEquals(a) => {
            check_output(&a.output_equals, outcome, |actual, wanted| actual == wanted)
        }
        ScenarioAssertion::OutputContains(a) => {
            check_output(&a.output_contains, outcome, |actual, needle| {
                needle.is_empty() || actual.windows(needle.len()).any(|w| w == needle)
            })
        }
        ScenarioAssertion::OverflowCount(a) => {
            let stats = outcome.stats(a.expected_overflows.channel.into());
            check(stats.overflows == a.expected_overflows.count, || {
                stats.overflows.to_string()
            })
        }
        ScenarioAssertion::TransmitFaultCount(a) => {
            let stats = outcome.stats(a.expected_transmit_faults.channel.into());
            check(
                stats.transmit_faults == a.expected_transmit_faults.count,
                || stats.transmit_faults.to_string(),
            )
        }
    };

    AssertionResult {
        assertion: assertion.clone(),
        passed,
        observed,
    }
}

fn describe_output(kind: &str, expected: &OutputExpectation) -> String {
    let shown = expected
        .bytes()
        .map(|bytes| escape_bytes(&bytes))
        .unwrap_or_else(|_| "?".to_string());
    format!("{}: {:?} \"{}\"", kind, expected.channel, shown)
}

pub fn assertion_short_name(assertion: &ScenarioAssertion) -> String {
    const MAX_LEN: usize = 120;
    let s = match assertion {
        ScenarioAssertion::OutputEquals(a) => describe_output("output_equals", &a.output_equals),
        ScenarioAssertion::OutputContains(a) => {
            describe_output("output_contains", &a.output_contains)
        }
        ScenarioAssertion::OverflowCount(a) => format!(
            "expected_overflows: {:?} = {}",
            a.expected_overflows.channel, a.expected_overflows.count
        ),
        ScenarioAssertion::TransmitFaultCount(a) => format!(
            "expected_transmit_faults: {:?} = {}",
            a.expected_transmit_faults.channel, a.expected_transmit_faults.count
        ),
    };

    if s.len() <= MAX_LEN {
        return s;
    }
    let mut end = MAX_LEN;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

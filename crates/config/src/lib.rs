// BlueRelay - UART Bluetooth Bridge
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use bluerelay_core::{
    ChannelId, LineEnding, OverflowPolicy, RelayConfig, TxWait, DEFAULT_CAPACITY,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

pub const SCHEMA_VERSION: &str = "1.0";

/// Largest line buffer a scenario may ask for.
pub const MAX_CAPACITY: usize = 4096;

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelName {
    #[serde(alias = "terminal", alias = "uart0")]
    Host,
    #[serde(alias = "bluetooth", alias = "uart2")]
    Module,
}

impl From<ChannelName> for ChannelId {
    fn from(name: ChannelName) -> Self {
        match name {
            ChannelName::Host => ChannelId::Host,
            ChannelName::Module => ChannelId::Module,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowMode {
    #[default]
    #[serde(alias = "flush")]
    FlushTruncated,
    #[serde(alias = "discard")]
    DiscardUntilTerminator,
}

impl FromStr for OverflowMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let v = value.trim().to_ascii_lowercase().replace('-', "_");
        match v.as_str() {
            "flush_truncated" | "flush" | "truncate" => Ok(Self::FlushTruncated),
            "discard_until_terminator" | "discard" => Ok(Self::DiscardUntilTerminator),
            _ => Err(format!(
                "unsupported overflow policy '{}'; supported: flush_truncated, discard_until_terminator",
                value
            )),
        }
    }
}

impl From<OverflowMode> for OverflowPolicy {
    fn from(mode: OverflowMode) -> Self {
        match mode {
            OverflowMode::FlushTruncated => OverflowPolicy::FlushTruncated,
            OverflowMode::DiscardUntilTerminator => OverflowPolicy::DiscardUntilTerminator,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEndingMode {
    #[default]
    Crlf,
    Lf,
}

impl FromStr for LineEndingMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "crlf" | "literal" => Ok(Self::Crlf),
            "lf" => Ok(Self::Lf),
            _ => Err(format!(
                "unsupported line ending '{}'; supported: crlf, lf",
                value
            )),
        }
    }
}

impl From<LineEndingMode> for LineEnding {
    fn from(mode: LineEndingMode) -> Self {
        match mode {
            LineEndingMode::Crlf => LineEnding::CrLf,
            LineEndingMode::Lf => LineEnding::Lf,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    /// Defaults to on for the host channel and off for the module channel.
    #[serde(default)]
    pub echo: Option<bool>,
    /// Simulated hardware stops accepting bytes after this many.
    #[serde(default)]
    pub tx_stall_after: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub overflow: OverflowMode,
    #[serde(default)]
    pub line_ending: LineEndingMode,
    /// Bound on the transmit-ready wait; unbounded when absent.
    #[serde(default)]
    pub tx_wait_spins: Option<u32>,
    #[serde(default)]
    pub host: ChannelConfig,
    #[serde(default)]
    pub module: ChannelConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            overflow: OverflowMode::default(),
            line_ending: LineEndingMode::default(),
            tx_wait_spins: None,
            host: ChannelConfig::default(),
            module: ChannelConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read bridge config at {:?}", path.as_ref()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("Failed to parse Bridge Config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity < 2 {
            anyhow::bail!("Bridge 'capacity' must be at least 2 (got {})", self.capacity);
        }
        if self.capacity > MAX_CAPACITY {
            anyhow::bail!(
                "Bridge 'capacity' {} exceeds MAX_CAPACITY {}",
                self.capacity,
                MAX_CAPACITY
            );
        }
        if self.tx_wait_spins == Some(0) {
            anyhow::bail!("Bridge 'tx_wait_spins' must be greater than zero");
        }
        for id in [ChannelId::Host, ChannelId::Module] {
            if self.channel(id).tx_stall_after.is_some() && self.tx_wait_spins.is_none() {
                anyhow::bail!(
                    "'{}.tx_stall_after' needs 'tx_wait_spins', otherwise the transmit wait never ends",
                    id
                );
            }
        }
        Ok(())
    }

    pub fn channel(&self, id: ChannelId) -> &ChannelConfig {
        match id {
            ChannelId::Host => &self.host,
            ChannelId::Module => &self.module,
        }
    }

    /// Relay settings for the relay that reads channel `id`.
    pub fn relay_config(&self, id: ChannelId) -> RelayConfig {
        let base = match id {
            ChannelId::Host => RelayConfig::host(),
            ChannelId::Module => RelayConfig::module(),
        };
        let mut config = base
            .with_overflow(self.overflow.into())
            .with_line_ending(self.line_ending.into());
        if let Some(echo) = self.channel(id).echo {
            config.echo = echo;
        }
        config
    }

    pub fn tx_wait(&self) -> TxWait {
        match self.tx_wait_spins {
            Some(spins) => TxWait::Spins(spins),
            None => TxWait::Unbounded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PayloadError {
    #[error("must set exactly one of '{text}' or '{hex}'")]
    Ambiguous {
        text: &'static str,
        hex: &'static str,
    },
    #[error("invalid '{field}' payload: {source}")]
    Hex {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },
}

/// Resolve a payload given either as literal text or as hex, whitespace ignored.
fn decode_payload(
    text: Option<&str>,
    encoded: Option<&str>,
    keys: (&'static str, &'static str),
) -> Result<Vec<u8>, PayloadError> {
    match (text, encoded) {
        (Some(text), None) => Ok(text.as_bytes().to_vec()),
        (None, Some(encoded)) => {
            let compact: String = encoded.split_whitespace().collect();
            hex::decode(compact).map_err(|source| PayloadError::Hex {
                field: keys.1,
                source,
            })
        }
        _ => Err(PayloadError::Ambiguous {
            text: keys.0,
            hex: keys.1,
        }),
    }
}

/// Bytes arriving on one channel.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioStep {
    pub channel: ChannelName,
    #[serde(default)]
    pub send: Option<String>,
    /// Hex-encoded payload, whitespace ignored (e.g. "41 54 0d").
    #[serde(default)]
    pub send_hex: Option<String>,
}

impl ScenarioStep {
    pub fn bytes(&self) -> Result<Vec<u8>, PayloadError> {
        decode_payload(
            self.send.as_deref(),
            self.send_hex.as_deref(),
            ("send", "send_hex"),
        )
    }
}

/// Expected output on a channel, as literal text or as hex for bytes that
/// are not valid UTF-8.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OutputExpectation {
    pub channel: ChannelName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
}

impl OutputExpectation {
    pub fn bytes(&self) -> Result<Vec<u8>, PayloadError> {
        decode_payload(self.text.as_deref(), self.hex.as_deref(), ("text", "hex"))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CountExpectation {
    pub channel: ChannelName,
    pub count: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct OutputEqualsAssertion {
    pub output_equals: OutputExpectation,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct OutputContainsAssertion {
    pub output_contains: OutputExpectation,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct OverflowCountAssertion {
    pub expected_overflows: CountExpectation,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TransmitFaultCountAssertion {
    pub expected_transmit_faults: CountExpectation,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum ScenarioAssertion {
    OutputEquals(OutputEqualsAssertion),
    OutputContains(OutputContainsAssertion),
    OverflowCount(OverflowCountAssertion),
    TransmitFaultCount(TransmitFaultCountAssertion),
}

impl ScenarioAssertion {
    /// The byte expectation carried by output assertions.
    pub fn output(&self) -> Option<&OutputExpectation> {
        match self {
            Self::OutputEquals(a) => Some(&a.output_equals),
            Self::OutputContains(a) => Some(&a.output_contains),
            Self::OverflowCount(_) | Self::TransmitFaultCount(_) => None,
        }
    }
}

/// A scripted run of the bridge: configuration, input, expected output.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub schema_version: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Bridge settings; a base config (see [`Scenario::apply_base_bridge`])
    /// or the defaults apply when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge: Option<BridgeConfig>,
    pub steps: Vec<ScenarioStep>,
    #[serde(default)]
    pub assertions: Vec<ScenarioAssertion>,
}

impl Scenario {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario at {:?}", path.as_ref()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let scenario: Self =
            serde_yaml::from_str(yaml).context("Failed to parse Scenario YAML")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '{}'",
                self.schema_version,
                SCHEMA_VERSION
            );
        }

        self.bridge().validate()?;

        if self.steps.is_empty() {
            anyhow::bail!("Scenario must contain at least one step");
        }
        for (i, step) in self.steps.iter().enumerate() {
            step.bytes()
                .with_context(|| format!("Invalid step {} ({:?})", i + 1, step.channel))?;
        }

        for (i, assertion) in self.assertions.iter().enumerate() {
            if let Some(expected) = assertion.output() {
                expected
                    .bytes()
                    .with_context(|| format!("Invalid assertion {}", i + 1))?;
            }
        }

        if self.assertions.is_empty() {
            tracing::warn!("Scenario has no assertions; it can only fail on runtime errors");
        }
        Ok(())
    }

    /// Effective bridge settings.
    pub fn bridge(&self) -> BridgeConfig {
        self.bridge.unwrap_or_default()
    }

    pub fn bridge_mut(&mut self) -> &mut BridgeConfig {
        self.bridge.get_or_insert_with(BridgeConfig::default)
    }

    /// Use `base` unless the scenario brings its own `bridge` section.
    pub fn apply_base_bridge(&mut self, base: BridgeConfig) {
        if self.bridge.is_none() {
            self.bridge = Some(base);
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("scenario")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_scenario() {
        let yaml = r#"
schema_version: "1.0"
name: "ls round trip"
bridge:
  capacity: 32
  overflow: discard
  line_ending: lf
steps:
  - channel: host
    send: "ls\r"
  - channel: bluetooth
    send_hex: "4f 4b 0d"
assertions:
  - output_equals: { channel: module, text: "ls\n" }
  - expected_overflows: { channel: host, count: 0 }
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.display_name(), "ls round trip");
        assert_eq!(scenario.bridge().overflow, OverflowMode::DiscardUntilTerminator);
        assert_eq!(scenario.steps[0].bytes().unwrap(), b"ls\r");
        assert_eq!(scenario.steps[1].channel, ChannelName::Module);
        assert_eq!(scenario.steps[1].bytes().unwrap(), b"OK\r");
        assert_eq!(scenario.assertions.len(), 2);
        assert!(matches!(
            scenario.assertions[1],
            ScenarioAssertion::OverflowCount(_)
        ));
    }

    #[test]
    fn test_bridge_defaults() {
        let scenario = Scenario::from_yaml(
            r#"
schema_version: "1.0"
steps:
  - channel: host
    send: "x"
"#,
        )
        .unwrap();
        assert!(scenario.bridge.is_none());
        assert_eq!(scenario.bridge(), BridgeConfig::default());
        assert_eq!(scenario.bridge().tx_wait(), TxWait::Unbounded);
        assert!(scenario.bridge().relay_config(ChannelId::Host).echo);
        assert!(!scenario.bridge().relay_config(ChannelId::Module).echo);
    }

    #[test]
    fn test_base_bridge_only_fills_missing_section() {
        let base = BridgeConfig {
            capacity: 8,
            line_ending: LineEndingMode::Lf,
            ..BridgeConfig::default()
        };

        let mut bare = Scenario::from_yaml(
            "schema_version: \"1.0\"\nsteps:\n  - channel: host\n    send: \"x\"\n",
        )
        .unwrap();
        bare.apply_base_bridge(base);
        assert_eq!(bare.bridge(), base);

        let mut own = Scenario::from_yaml(
            "schema_version: \"1.0\"\nbridge:\n  capacity: 16\nsteps:\n  - channel: host\n    send: \"x\"\n",
        )
        .unwrap();
        own.apply_base_bridge(base);
        assert_eq!(own.bridge().capacity, 16);
        assert_eq!(own.bridge().line_ending, LineEndingMode::Crlf);
    }

    #[test]
    fn test_echo_override() {
        let config = BridgeConfig::from_yaml(
            r#"
host:
  echo: false
module:
  echo: true
"#,
        )
        .unwrap();
        assert!(!config.relay_config(ChannelId::Host).echo);
        assert!(config.relay_config(ChannelId::Module).echo);
    }

    #[test]
    fn test_invalid_version() {
        let err = Scenario::from_yaml(
            r#"
schema_version: "2.0"
steps:
  - channel: host
    send: "x"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unsupported schema_version"));
    }

    #[test]
    fn test_empty_steps() {
        let err = Scenario::from_yaml("schema_version: \"1.0\"\nsteps: []\n").unwrap_err();
        assert!(err.to_string().contains("at least one step"));
    }

    #[test]
    fn test_step_with_both_payloads() {
        let step = ScenarioStep {
            channel: ChannelName::Host,
            send: Some("a".to_string()),
            send_hex: Some("61".to_string()),
        };
        assert_eq!(
            step.bytes().unwrap_err(),
            PayloadError::Ambiguous {
                text: "send",
                hex: "send_hex"
            }
        );
    }

    #[test]
    fn test_output_expectation_hex() {
        let yaml = r#"
schema_version: "1.0"
steps:
  - channel: module
    send_hex: "41 ff 0d"
assertions:
  - output_equals: { channel: host, hex: "41 FF 0d 0a" }
  - output_contains: { channel: host, text: "A" }
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        let expected = scenario.assertions[0].output().unwrap();
        assert!(expected.text.is_none());
        assert_eq!(expected.bytes().unwrap(), b"A\xff\r\n");
        assert_eq!(scenario.assertions[1].output().unwrap().bytes().unwrap(), b"A");
    }

    #[test]
    fn test_output_expectation_needs_one_payload() {
        let both = r#"
schema_version: "1.0"
steps:
  - channel: host
    send: "x"
assertions:
  - output_equals: { channel: host, text: "x", hex: "78" }
"#;
        let err = Scenario::from_yaml(both).unwrap_err();
        assert!(format!("{:#}", err).contains("exactly one of 'text' or 'hex'"));

        let bad = r#"
schema_version: "1.0"
steps:
  - channel: host
    send: "x"
assertions:
  - output_contains: { channel: host, hex: "f" }
"#;
        let err = Scenario::from_yaml(bad).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid 'hex' payload"));
    }

    #[test]
    fn test_bad_hex_is_config_error() {
        let err = Scenario::from_yaml(
            r#"
schema_version: "1.0"
steps:
  - channel: module
    send_hex: "zz"
"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("send_hex"));
    }

    #[test]
    fn test_capacity_bounds() {
        let err = BridgeConfig::from_yaml("capacity: 1\n").unwrap_err();
        assert!(err.to_string().contains("capacity"));
        let err = BridgeConfig::from_yaml("capacity: 100000\n").unwrap_err();
        assert!(err.to_string().contains("MAX_CAPACITY"));
    }

    #[test]
    fn test_stall_requires_bounded_wait() {
        let err = BridgeConfig::from_yaml("module:\n  tx_stall_after: 2\n").unwrap_err();
        assert!(err.to_string().contains("tx_wait_spins"));

        let config =
            BridgeConfig::from_yaml("tx_wait_spins: 10\nmodule:\n  tx_stall_after: 2\n").unwrap();
        assert_eq!(config.tx_wait(), TxWait::Spins(10));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(BridgeConfig::from_yaml("baud: 9600\n").is_err());
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!(
            "discard-until-terminator".parse::<OverflowMode>().unwrap(),
            OverflowMode::DiscardUntilTerminator
        );
        assert_eq!("LF".parse::<LineEndingMode>().unwrap(), LineEndingMode::Lf);
        assert!("cr".parse::<LineEndingMode>().is_err());
    }
}

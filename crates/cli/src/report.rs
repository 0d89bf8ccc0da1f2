// BlueRelay - UART Bluetooth Bridge
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use bluerelay_config::{LineEndingMode, OverflowMode};
use bluerelay_core::RelayStats;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::simulate::{assertion_short_name, AssertionResult, Outcome};
use crate::transcript::write_transcript;

pub const RESULT_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pass,
    Fail,
    Error,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pass => "pass",
            Status::Fail => "fail",
            Status::Error => "error",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsReport {
    pub bytes_received: u32,
    pub lines_forwarded: u32,
    pub bytes_forwarded: u32,
    pub overflows: u32,
    pub dropped_bytes: u32,
    pub transmit_faults: u32,
}

impl From<&RelayStats> for StatsReport {
    fn from(stats: &RelayStats) -> Self {
        Self {
            bytes_received: stats.bytes_received,
            lines_forwarded: stats.lines_forwarded,
            bytes_forwarded: stats.bytes_forwarded,
            overflows: stats.overflows,
            dropped_bytes: stats.dropped_bytes,
            transmit_faults: stats.transmit_faults,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RelayReport {
    pub host: StatsReport,
    pub module: StatsReport,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RunConfig {
    pub script: PathBuf,
    pub capacity: usize,
    pub overflow: OverflowMode,
    pub line_ending: LineEndingMode,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SimulationResult {
    pub result_schema_version: String,
    pub status: Status,
    pub scenario: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub bytes_handled: usize,
    pub assertions: Vec<AssertionResult>,
    pub relays: RelayReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<RunConfig>,
}

impl SimulationResult {
    /// Result for a run that never got as far as the bridge.
    pub fn error(scenario: &str, message: String, config: Option<RunConfig>) -> Self {
        Self {
            result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
            status: Status::Error,
            scenario: scenario.to_string(),
            message: Some(message),
            bytes_handled: 0,
            assertions: Vec::new(),
            relays: RelayReport::default(),
            config,
        }
    }

    pub fn completed(
        scenario: &str,
        outcome: &Outcome,
        assertions: Vec<AssertionResult>,
        config: RunConfig,
    ) -> Self {
        let status = if assertions.iter().all(|a| a.passed) {
            Status::Pass
        } else {
            Status::Fail
        };
        Self {
            result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
            status,
            scenario: scenario.to_string(),
            message: None,
            bytes_handled: outcome.bytes_handled,
            assertions,
            relays: RelayReport {
                host: (&outcome.host_stats).into(),
                module: (&outcome.module_stats).into(),
            },
            config: Some(config),
        }
    }
}

/// Write `result.json` and, when the run produced output, one transcript per
/// channel into `output_dir`.
pub fn write_outputs(
    output_dir: &Path,
    result: &SimulationResult,
    outcome: Option<&Outcome>,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    let result_path = output_dir.join("result.json");
    let file = std::fs::File::create(&result_path)
        .with_context(|| format!("Failed to create {:?}", result_path))?;
    serde_json::to_writer_pretty(file, result).context("Failed to write result.json")?;

    if let Some(outcome) = outcome {
        for (name, bytes) in [
            ("host.log", &outcome.host_tx),
            ("module.log", &outcome.module_tx),
        ] {
            let path = output_dir.join(name);
            let truncated = write_transcript(&path, bytes)
                .with_context(|| format!("Failed to write {:?}", path))?;
            if truncated {
                warn!("{} truncated ({} bytes captured)", name, bytes.len());
            }
        }
    }

    info!("Artifacts written to {:?}", output_dir);
    Ok(())
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn run_details(result: &SimulationResult) -> String {
    let mut details = String::new();
    details.push_str(&format!(
        "result_schema_version={}\n",
        result.result_schema_version
    ));
    details.push_str(&format!("status={}\n", result.status.as_str()));
    if let Some(msg) = &result.message {
        details.push_str(&format!("message={}\n", msg));
    }
    details.push_str(&format!("bytes_handled={}\n", result.bytes_handled));
    for (name, stats) in [("host", &result.relays.host), ("module", &result.relays.module)] {
        details.push_str(&format!(
            "{}: received={} lines={} overflows={} dropped={} transmit_faults={}\n",
            name,
            stats.bytes_received,
            stats.lines_forwarded,
            stats.overflows,
            stats.dropped_bytes,
            stats.transmit_faults
        ));
    }
    if let Some(config) = &result.config {
        details.push_str(&format!("script={}\n", config.script.display()));
        details.push_str(&format!("capacity={}\n", config.capacity));
    }
    details
}

/// One `run` testcase plus one testcase per assertion.
pub fn write_junit_xml(path: &Path, result: &SimulationResult, duration: Duration) -> Result<()> {
    let details = run_details(result);
    let time_secs = duration.as_secs_f64();

    let mut tests = 1u64;
    let mut failures = 0u64;
    let mut errors = 0u64;
    let mut testcases = String::new();

    testcases.push_str(&format!(
        "  <testcase classname=\"bluerelay\" name=\"run\" time=\"{:.6}\">\n",
        time_secs
    ));
    if result.status == Status::Error {
        errors += 1;
        testcases.push_str(&format!(
            "    <error message=\"{}\">{}</error>\n",
            xml_escape(result.message.as_deref().unwrap_or("error")),
            xml_escape(&details)
        ));
    }
    testcases.push_str("  </testcase>\n");

    for (idx, a) in result.assertions.iter().enumerate() {
        tests += 1;
        let name = format!(
            "assertion {}: {}",
            idx + 1,
            assertion_short_name(&a.assertion)
        );
        testcases.push_str(&format!(
            "  <testcase classname=\"bluerelay\" name=\"{}\" time=\"0.000000\">\n",
            xml_escape(&name)
        ));
        if !a.passed {
            failures += 1;
            let observed = a.observed.as_deref().unwrap_or("");
            testcases.push_str(&format!(
                "    <failure message=\"assertion failed\">{}</failure>\n",
                xml_escape(&format!("{}\nobserved: {}\n\n{}", name, observed, details))
            ));
        }
        testcases.push_str("  </testcase>\n");
    }

    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(&format!(
        r#"<testsuite name="{}" tests="{}" failures="{}" errors="{}" time="{:.6}">"#,
        xml_escape(&result.scenario),
        tests,
        failures,
        errors,
        time_secs
    ));
    xml.push('\n');
    xml.push_str("  <properties>\n");
    xml.push_str(&format!(
        "    <property name=\"result_schema_version\" value=\"{}\"/>\n",
        xml_escape(&result.result_schema_version)
    ));
    xml.push_str(&format!(
        "    <property name=\"status\" value=\"{}\"/>\n",
        result.status.as_str()
    ));
    xml.push_str("  </properties>\n");
    xml.push_str(&testcases);
    xml.push_str("</testsuite>\n");

    std::fs::write(path, xml).with_context(|| format!("Failed to write JUnit report {:?}", path))
}

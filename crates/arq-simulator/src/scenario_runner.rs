//! Load a TOML scenario, run it, and evaluate its assertions.

use std::fs;
use std::path::Path;

use arq_abstract::{ProtocolEndpoint, SimConfig, TestAction, TestAssertion, TestScenario, message_block};
use thiserror::Error;
use tracing::info;

use crate::engine::Simulator;
use crate::trace::SimulationReport;

/// Simulated-time budget for scenarios that don't assert a duration.
pub const DEFAULT_DEADLINE_MS: u64 = 600_000;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scenario file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("scenario '{scenario}' failed: {detail}")]
    AssertionFailed { scenario: String, detail: String },
}

pub fn load_scenario(path: &Path) -> Result<TestScenario, ScenarioError> {
    let content = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Convenience wrapper: load from disk, run, check.
pub fn run_scenario(
    path: &Path,
    sender: Box<dyn ProtocolEndpoint>,
    receiver: Box<dyn ProtocolEndpoint>,
) -> Result<SimulationReport, ScenarioError> {
    let scenario = load_scenario(path)?;
    run_scenario_with(&scenario, sender, receiver)
}

/// Run a parsed scenario against an endpoint pair and evaluate every
/// assertion against the final report.
pub fn run_scenario_with(
    scenario: &TestScenario,
    sender: Box<dyn ProtocolEndpoint>,
    receiver: Box<dyn ProtocolEndpoint>,
) -> Result<SimulationReport, ScenarioError> {
    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);

    let mut sim = Simulator::new(config, sender, receiver);
    apply_actions(&mut sim, &scenario.actions);

    let deadline = scenario
        .assertions
        .iter()
        .filter_map(|a| match a {
            TestAssertion::MaxDuration { ms } => Some(*ms),
            _ => None,
        })
        .max()
        .unwrap_or(DEFAULT_DEADLINE_MS);

    info!("Running scenario '{}' (deadline {}ms)", scenario.name, deadline);
    sim.run_for(deadline);

    let report = sim.export_report();
    check_assertions(scenario, &report)?;
    Ok(report)
}

fn apply_actions(sim: &mut Simulator, actions: &[TestAction]) {
    for action in actions {
        match action {
            TestAction::AppSend { time, data } => {
                sim.schedule_app_send(*time, data.as_bytes().to_vec());
            }
            TestAction::DropNextFromSenderSeq { seq } => {
                sim.add_drop_sender_seq_once(*seq);
            }
            TestAction::DropNextFromReceiverAck { ack } => {
                sim.add_drop_receiver_ack_once(*ack);
            }
            TestAction::CorruptNextFromSenderSeq { seq } => {
                sim.add_corrupt_sender_seq_once(*seq);
            }
            TestAction::CorruptNextFromReceiverAck { ack } => {
                sim.add_corrupt_receiver_ack_once(*ack);
            }
        }
    }
}

fn check_assertions(
    scenario: &TestScenario,
    report: &SimulationReport,
) -> Result<(), ScenarioError> {
    let fail = |detail: String| ScenarioError::AssertionFailed {
        scenario: scenario.name.clone(),
        detail,
    };

    for assertion in &scenario.assertions {
        match assertion {
            TestAssertion::DataDelivered { data } => {
                let block = message_block(data.as_bytes());
                if !report.delivered_data.iter().any(|d| d[..] == block[..]) {
                    return Err(fail(format!("data '{data}' was never delivered")));
                }
            }
            TestAssertion::DeliveredCount { count } => {
                if report.delivered_data.len() != *count {
                    return Err(fail(format!(
                        "expected {} deliveries, saw {}",
                        count,
                        report.delivered_data.len()
                    )));
                }
            }
            TestAssertion::SenderPacketCount { min, max } => {
                if report.sender_packet_count < *min {
                    return Err(fail(format!(
                        "sender packet count {} below minimum {}",
                        report.sender_packet_count, min
                    )));
                }
                if let Some(max) = max {
                    if report.sender_packet_count > *max {
                        return Err(fail(format!(
                            "sender packet count {} above maximum {}",
                            report.sender_packet_count, max
                        )));
                    }
                }
            }
            TestAssertion::MaxDuration { ms } => {
                if report.duration_ms > *ms {
                    return Err(fail(format!(
                        "simulation ran {}ms, budget was {}ms",
                        report.duration_ms, ms
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_toml_parses() {
        let text = r#"
            name = "smoke"
            description = "parse check"

            [config]
            seed = 7
            window_size = 4

            [[actions]]
            type = "app_send"
            time = 100
            data = "hello"

            [[actions]]
            type = "drop_next_from_receiver_ack"
            ack = 0

            [[assertions]]
            type = "data_delivered"
            data = "hello"

            [[assertions]]
            type = "sender_packet_count"
            min = 1
        "#;
        let scenario: TestScenario = toml::from_str(text).unwrap();
        assert_eq!(scenario.name, "smoke");
        assert_eq!(scenario.actions.len(), 2);
        assert_eq!(scenario.assertions.len(), 2);
        assert_eq!(scenario.config.seed, Some(7));
    }
}

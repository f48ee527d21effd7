use crate::config::SimConfig;
use serde::Deserialize;

/// A scripted simulation: channel overrides, a timed workload with
/// deterministic faults, and assertions checked against the final report.
#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    pub config: SimConfigOverride,
    pub actions: Vec<TestAction>,
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    pub loss_rate: Option<f64>,
    pub corrupt_rate: Option<f64>,
    pub min_latency: Option<u64>,
    pub max_latency: Option<u64>,
    pub seed: Option<u64>,
    pub window_size: Option<u32>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
        }
        if let Some(v) = self.corrupt_rate {
            config.corrupt_rate = v;
        }
        if let Some(v) = self.min_latency {
            config.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            config.max_latency = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Application submits a message at a specific time.
    AppSend { time: u64, data: String },
    /// Drop the first sender data packet carrying this seqnum.
    DropNextFromSenderSeq { seq: u64 },
    /// Drop the first receiver packet carrying this acknum.
    DropNextFromReceiverAck { ack: u64 },
    /// Corrupt the first sender data packet carrying this seqnum.
    CorruptNextFromSenderSeq { seq: u64 },
    /// Corrupt the first receiver packet carrying this acknum.
    CorruptNextFromReceiverAck { ack: u64 },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// The application sink received this message (padded to block size).
    DataDelivered { data: String },
    /// The sink received exactly this many messages.
    DeliveredCount { count: usize },
    /// Total data packets the sender put on the channel is within range.
    SenderPacketCount { min: u32, max: Option<u32> },
    /// The simulation finished within this many simulated milliseconds.
    MaxDuration { ms: u64 },
}

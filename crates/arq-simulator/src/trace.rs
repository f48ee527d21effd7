use serde::Serialize;
use std::collections::HashMap;
use arq_abstract::SimConfig;

use crate::engine::LinkEventSummary;

/// Serializable snapshot of a finished simulation, written by the CLI's
/// `--trace-out` and consumed by scenario assertions.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub duration_ms: u64,
    pub delivered_data: Vec<Vec<u8>>,
    pub sender_packet_count: u32,
    pub sender_packet_log: Vec<(u64, u64)>,
    pub metrics: HashMap<String, Vec<(u64, f64)>>,
    pub link_events: Vec<LinkEventSummary>,
}

pub mod engine;
pub mod scenario_runner;
pub mod trace;

pub use engine::{LinkEventSummary, NodeId, Simulator};
pub use scenario_runner::{ScenarioError, load_scenario, run_scenario, run_scenario_with};
pub use trace::SimulationReport;

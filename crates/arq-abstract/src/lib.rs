pub mod checksum;
pub mod config;
pub mod interface;
pub mod packet;
pub mod scenario;

pub use config::{ProtocolMode, SimConfig};
pub use interface::{ProtocolEndpoint, SimContext};
pub use packet::{MSG_SIZE, MessageBlock, Packet, message_block};
pub use scenario::{SimConfigOverride, TestAction, TestAssertion, TestScenario};

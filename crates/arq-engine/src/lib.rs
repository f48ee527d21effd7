//! Reliable-data-transfer protocol engine.
//!
//! One sender/receiver pair moves a stream of fixed-size messages across an
//! unreliable channel, in order, exactly once. Three retransmission
//! disciplines share the same core and differ only in window, ACK and timer
//! policy: Alternating-Bit, Go-Back-N and Selective-Repeat. The engine is
//! driven entirely through the `ProtocolEndpoint` entry points and talks
//! back through `SimContext`; it owns no clock, no RNG and no I/O.

pub mod outcome;
pub mod receiver;
pub mod sender;
pub mod timer;

mod window;

#[cfg(test)]
mod test_support;

pub use outcome::{AckOutcome, DropReason, RecvOutcome, SubmitOutcome};
pub use receiver::Receiver;
pub use sender::Sender;
pub use timer::{RETRANSMIT_TIMER, TimerPolicy};

use arq_abstract::{ProtocolEndpoint, ProtocolMode};

/// Build a boxed sender/receiver pair for one mode, ready to hand to an
/// emulator.
pub fn endpoint_pair(
    mode: ProtocolMode,
) -> (Box<dyn ProtocolEndpoint>, Box<dyn ProtocolEndpoint>) {
    (
        Box::new(Sender::new(mode)),
        Box::new(Receiver::new(mode)),
    )
}

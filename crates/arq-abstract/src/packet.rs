use serde::{Deserialize, Serialize};

use crate::checksum;

/// Fixed payload size of every frame. One application message maps to
/// exactly one packet; there is no fragmentation or reassembly of the
/// payload itself.
pub const MSG_SIZE: usize = 20;

/// The unit handed down by the application and handed up to the sink.
pub type MessageBlock = [u8; MSG_SIZE];

/// Copy application data into a fixed message block, truncating anything
/// past `MSG_SIZE` and zero-padding short input.
pub fn message_block(data: &[u8]) -> MessageBlock {
    let mut block = [0u8; MSG_SIZE];
    let n = data.len().min(MSG_SIZE);
    block[..n].copy_from_slice(&data[..n]);
    block
}

/// A frame on the simulated channel. Sequence and acknowledgment numbers
/// are unbounded counters; the checksum covers both of them plus the
/// payload and must be verified before any other field is trusted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Packet {
    pub seqnum: u64,
    pub acknum: u64,
    pub checksum: u32,
    pub payload: MessageBlock,
}

impl Packet {
    /// Build a data packet carrying one message block. `ack_echo` is the
    /// sender's last-seen acknowledgment sequence, mirrored into the frame.
    pub fn data(seqnum: u64, ack_echo: u64, payload: MessageBlock) -> Self {
        let mut packet = Self {
            seqnum,
            acknum: ack_echo,
            checksum: 0,
            payload,
        };
        packet.checksum = checksum::compute(&packet);
        packet
    }

    /// Build a payload-free acknowledgment packet.
    pub fn control(seqnum: u64, acknum: u64) -> Self {
        Self::data(seqnum, acknum, [0u8; MSG_SIZE])
    }

    /// Recompute the checksum and compare it to the carried field.
    pub fn is_intact(&self) -> bool {
        checksum::verify(self)
    }
}

//! Entry-point dispositions.
//!
//! Nothing in the protocol core is fatal: corrupt, stale and out-of-window
//! inputs degrade to "ignore and let the timeout recover". The entry points
//! make that visible by returning these enums instead of a `Result`.

/// Why an inbound packet was dropped without touching any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Checksum mismatch; no field of the packet can be trusted.
    Corrupt,
    /// Sequence or acknowledgment number outside the currently valid range.
    OutOfWindow,
}

/// Result of the application submitting one message to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The message entered the window and its packet went on the channel.
    Sent { seq: u64 },
    /// The window is full; the message is queued and will be transmitted
    /// once the window slides.
    Queued { backlog: usize },
}

/// Result of the sender processing one inbound acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The window's lower edge advanced.
    Slid { new_base: u64 },
    /// An in-window packet was marked acked but the base did not move
    /// (Selective-Repeat only).
    Marked { seq: u64 },
    /// The acknowledgment was dropped without any state change.
    Ignored(DropReason),
}

/// Result of the receiver processing one inbound data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    /// One or more payloads went up to the application, starting at
    /// `first_seq`; an acknowledgment went out.
    Delivered { first_seq: u64, count: usize },
    /// The packet was stored for later in-order delivery and acknowledged
    /// individually (Selective-Repeat only).
    Buffered { seq: u64 },
    /// A duplicate of an already-delivered packet; acknowledged again but
    /// not re-delivered.
    ReAcked { ack: u64 },
    /// The packet was dropped without any state change and without an
    /// acknowledgment.
    Ignored(DropReason),
}

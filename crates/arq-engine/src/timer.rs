//! Per-variant retransmission timer policy.

use arq_abstract::ProtocolMode;

/// Timer id used for the sender's retransmission timer. Each side owns its
/// ids, and the receiver never arms one, so a single constant suffices.
pub const RETRANSMIT_TIMER: u32 = 1;

/// How the sender drives its single timer resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPolicy {
    /// One timer covering the oldest unacked packet: armed when the window
    /// goes non-empty, stopped unconditionally on every slide, re-armed
    /// only while packets remain unacked. Never double-armed.
    OldestUnacked { timeout_ms: u64 },
    /// A periodic tick, armed at init and re-armed on every expiry
    /// regardless of ACK progress. Each tick scans the window and resends
    /// records whose last transmission is older than `resend_after_ms`.
    PeriodicScan { tick_ms: u64, resend_after_ms: u64 },
}

impl TimerPolicy {
    /// Fixed per-variant durations, deliberately well above the emulated
    /// one-way propagation delay.
    pub fn for_mode(mode: ProtocolMode) -> Self {
        match mode {
            ProtocolMode::AlternatingBit => Self::OldestUnacked { timeout_ms: 300 },
            ProtocolMode::GoBackN => Self::OldestUnacked { timeout_ms: 400 },
            ProtocolMode::SelectiveRepeat => Self::PeriodicScan {
                tick_ms: 200,
                resend_after_ms: 500,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_map_to_expected_policies() {
        assert!(matches!(
            TimerPolicy::for_mode(ProtocolMode::AlternatingBit),
            TimerPolicy::OldestUnacked { .. }
        ));
        assert!(matches!(
            TimerPolicy::for_mode(ProtocolMode::GoBackN),
            TimerPolicy::OldestUnacked { .. }
        ));
        assert!(matches!(
            TimerPolicy::for_mode(ProtocolMode::SelectiveRepeat),
            TimerPolicy::PeriodicScan { .. }
        ));
    }
}

//! Receiver-side state machine.
//!
//! Alternating-Bit and Go-Back-N accept only the packet at the cursor and
//! acknowledge cumulatively; Selective-Repeat accepts anything inside a
//! window around the cursor, buffers out-of-order arrivals, and
//! acknowledges each packet individually.

use arq_abstract::{Packet, ProtocolEndpoint, ProtocolMode, SimContext};

use crate::outcome::{DropReason, RecvOutcome};
use crate::window::SlotRing;

pub struct Receiver {
    mode: ProtocolMode,
    /// Window size, mirrored from the emulator configuration; only used by
    /// Selective-Repeat.
    window: u32,
    /// Next sequence number to deliver upward. Everything below has been
    /// delivered exactly once, in order.
    expected: u64,
    /// Out-of-order arrivals awaiting the contiguous prefix
    /// (Selective-Repeat only).
    reassembly: SlotRing<arq_abstract::MessageBlock>,
}

impl Receiver {
    pub fn new(mode: ProtocolMode) -> Self {
        Self {
            mode,
            window: 1,
            expected: 0,
            reassembly: SlotRing::new(1),
        }
    }

    pub fn mode(&self) -> ProtocolMode {
        self.mode
    }

    pub fn expected(&self) -> u64 {
        self.expected
    }

    fn configure(&mut self, ctx: &mut dyn SimContext) {
        self.window = ctx.window_size().max(1);
        if self.mode == ProtocolMode::SelectiveRepeat {
            self.reassembly = SlotRing::new(self.window as usize);
        }
    }

    /// Process one inbound data packet. Corrupt frames are a strict no-op:
    /// no state change and no acknowledgment, since the sender could not
    /// trust an ACK derived from an untrustworthy frame either.
    pub fn on_data(&mut self, ctx: &mut dyn SimContext, packet: &Packet) -> RecvOutcome {
        if !packet.is_intact() {
            return RecvOutcome::Ignored(DropReason::Corrupt);
        }
        match self.mode {
            ProtocolMode::AlternatingBit | ProtocolMode::GoBackN => {
                self.accept_in_order(ctx, packet)
            }
            ProtocolMode::SelectiveRepeat => self.accept_selective(ctx, packet),
        }
    }

    fn accept_in_order(&mut self, ctx: &mut dyn SimContext, packet: &Packet) -> RecvOutcome {
        let seq = packet.seqnum;
        if seq == self.expected {
            ctx.deliver(&packet.payload);
            self.expected += 1;
            self.send_ack(ctx, seq);
            RecvOutcome::Delivered {
                first_seq: seq,
                count: 1,
            }
        } else if seq < self.expected {
            // Duplicate of something already delivered: the peer's ACK was
            // evidently lost, so acknowledge again without re-delivering.
            let ack = self.expected - 1;
            self.send_ack(ctx, ack);
            RecvOutcome::ReAcked { ack }
        } else {
            // Ahead of the cursor; no buffering in these modes.
            RecvOutcome::Ignored(DropReason::OutOfWindow)
        }
    }

    fn accept_selective(&mut self, ctx: &mut dyn SimContext, packet: &Packet) -> RecvOutcome {
        let seq = packet.seqnum;
        let w = self.window as u64;
        if seq < self.expected.saturating_sub(w) || seq > self.expected + w {
            return RecvOutcome::Ignored(DropReason::OutOfWindow);
        }

        // Only the span the reassembly ring can hold needs storing;
        // everything below the cursor is already delivered. The store is
        // idempotent: a retransmitted duplicate just overwrites its slot.
        if seq >= self.expected && seq < self.expected + w {
            self.reassembly.insert(seq, packet.payload);
        }

        let first = self.expected;
        let mut count = 0;
        while let Some(block) = self.reassembly.take(self.expected) {
            ctx.deliver(&block);
            self.expected += 1;
            count += 1;
        }

        // The acknowledgment always carries the received packet's own
        // sequence number, whether or not anything was delivered upward.
        self.send_ack(ctx, seq);

        if count > 0 {
            RecvOutcome::Delivered {
                first_seq: first,
                count,
            }
        } else if seq < self.expected {
            RecvOutcome::ReAcked { ack: seq }
        } else {
            RecvOutcome::Buffered { seq }
        }
    }

    fn send_ack(&mut self, ctx: &mut dyn SimContext, ack: u64) {
        ctx.transmit(Packet::control(self.expected, ack));
    }
}

impl ProtocolEndpoint for Receiver {
    fn init(&mut self, ctx: &mut dyn SimContext) {
        self.configure(ctx);
        ctx.log(&format!("{} receiver ready", self.mode));
    }

    fn on_message(&mut self, _ctx: &mut dyn SimContext, _data: &[u8]) {
        // Transfer is one-directional; the receiver never originates data.
    }

    fn on_packet(&mut self, ctx: &mut dyn SimContext, packet: Packet) {
        match self.on_data(ctx, &packet) {
            RecvOutcome::Delivered { first_seq, count } => {
                ctx.log(&format!(
                    "{} delivered {} message(s) from seq={}",
                    self.mode, count, first_seq
                ));
            }
            RecvOutcome::Buffered { seq } => {
                ctx.log(&format!("{} buffered out-of-order seq={}", self.mode, seq));
            }
            RecvOutcome::ReAcked { ack } => {
                ctx.log(&format!("{} duplicate, re-ack {}", self.mode, ack));
            }
            RecvOutcome::Ignored(DropReason::Corrupt) => {
                ctx.log(&format!("{} dropping corrupt packet", self.mode));
            }
            RecvOutcome::Ignored(DropReason::OutOfWindow) => {
                ctx.log(&format!(
                    "{} dropping out-of-window seq={}",
                    self.mode, packet.seqnum
                ));
            }
        }
    }

    fn on_timer(&mut self, _ctx: &mut dyn SimContext, _timer_id: u32) {
        // The receiver owns no timers in any variant.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockCtx;
    use arq_abstract::message_block;

    fn receiver(mode: ProtocolMode, ctx: &mut MockCtx) -> Receiver {
        let mut r = Receiver::new(mode);
        r.configure(ctx);
        r
    }

    fn data(seq: u64, text: &[u8]) -> Packet {
        Packet::data(seq, 0, message_block(text))
    }

    #[test]
    fn in_order_packet_is_delivered_and_acked() {
        let mut ctx = MockCtx::with_window(1);
        let mut r = receiver(ProtocolMode::AlternatingBit, &mut ctx);

        let outcome = r.on_data(&mut ctx, &data(0, b"m1"));
        assert_eq!(
            outcome,
            RecvOutcome::Delivered {
                first_seq: 0,
                count: 1
            }
        );
        assert_eq!(ctx.delivered, vec![message_block(b"m1").to_vec()]);
        assert_eq!(ctx.transmitted.len(), 1);
        assert_eq!(ctx.transmitted[0].acknum, 0);
        assert_eq!(r.expected(), 1);
    }

    #[test]
    fn duplicate_reacks_without_redelivering() {
        let mut ctx = MockCtx::with_window(1);
        let mut r = receiver(ProtocolMode::AlternatingBit, &mut ctx);
        r.on_data(&mut ctx, &data(0, b"m1"));

        let outcome = r.on_data(&mut ctx, &data(0, b"m1"));
        assert_eq!(outcome, RecvOutcome::ReAcked { ack: 0 });
        // One delivery, two acknowledgments.
        assert_eq!(ctx.delivered.len(), 1);
        assert_eq!(ctx.transmitted.len(), 2);
        assert_eq!(ctx.transmitted[1].acknum, 0);
    }

    #[test]
    fn gbn_drops_packets_ahead_of_the_cursor() {
        let mut ctx = MockCtx::with_window(4);
        let mut r = receiver(ProtocolMode::GoBackN, &mut ctx);

        let outcome = r.on_data(&mut ctx, &data(2, b"m3"));
        assert_eq!(outcome, RecvOutcome::Ignored(DropReason::OutOfWindow));
        assert!(ctx.delivered.is_empty());
        // No acknowledgment for a dropped packet.
        assert!(ctx.transmitted.is_empty());
    }

    #[test]
    fn corrupt_packet_gets_no_ack_and_no_state_change() {
        let mut ctx = MockCtx::with_window(4);
        let mut r = receiver(ProtocolMode::GoBackN, &mut ctx);

        let mut packet = data(0, b"m1");
        packet.payload[0] ^= 0x01;
        let outcome = r.on_data(&mut ctx, &packet);
        assert_eq!(outcome, RecvOutcome::Ignored(DropReason::Corrupt));
        assert!(ctx.delivered.is_empty());
        assert!(ctx.transmitted.is_empty());
        assert_eq!(r.expected(), 0);
    }

    #[test]
    fn sr_buffers_ahead_and_drains_when_the_gap_fills() {
        let mut ctx = MockCtx::with_window(4);
        let mut r = receiver(ProtocolMode::SelectiveRepeat, &mut ctx);

        assert_eq!(
            r.on_data(&mut ctx, &data(1, b"m2")),
            RecvOutcome::Buffered { seq: 1 }
        );
        assert_eq!(
            r.on_data(&mut ctx, &data(2, b"m3")),
            RecvOutcome::Buffered { seq: 2 }
        );
        assert!(ctx.delivered.is_empty());
        // Each buffered packet was still acknowledged individually.
        let acks: Vec<u64> = ctx.transmitted.iter().map(|p| p.acknum).collect();
        assert_eq!(acks, vec![1, 2]);

        let outcome = r.on_data(&mut ctx, &data(0, b"m1"));
        assert_eq!(
            outcome,
            RecvOutcome::Delivered {
                first_seq: 0,
                count: 3
            }
        );
        let delivered: Vec<Vec<u8>> = [&b"m1"[..], b"m2", b"m3"]
            .iter()
            .map(|m| message_block(m).to_vec())
            .collect();
        assert_eq!(ctx.delivered, delivered);
        assert_eq!(r.expected(), 3);
    }

    #[test]
    fn sr_ack_carries_the_packets_own_seq() {
        let mut ctx = MockCtx::with_window(4);
        let mut r = receiver(ProtocolMode::SelectiveRepeat, &mut ctx);
        r.on_data(&mut ctx, &data(3, b"m4"));
        assert_eq!(ctx.transmitted[0].acknum, 3);

        // A duplicate below the cursor is also acked with its own seq.
        r.on_data(&mut ctx, &data(0, b"m1"));
        ctx.transmitted.clear();
        assert_eq!(
            r.on_data(&mut ctx, &data(0, b"m1")),
            RecvOutcome::ReAcked { ack: 0 }
        );
        assert_eq!(ctx.transmitted[0].acknum, 0);
    }

    #[test]
    fn sr_rejects_sequences_outside_the_window() {
        let mut ctx = MockCtx::with_window(4);
        let mut r = receiver(ProtocolMode::SelectiveRepeat, &mut ctx);

        assert_eq!(
            r.on_data(&mut ctx, &data(5, b"mx")),
            RecvOutcome::Ignored(DropReason::OutOfWindow)
        );
        assert!(ctx.transmitted.is_empty());
    }

    #[test]
    fn endpoint_adapter_logs_each_disposition() {
        let mut ctx = MockCtx::with_window(1);
        let mut r = Receiver::new(ProtocolMode::AlternatingBit);
        r.init(&mut ctx);
        r.on_packet(&mut ctx, data(0, b"m1"));
        r.on_packet(&mut ctx, data(0, b"m1"));

        assert_eq!(ctx.delivered.len(), 1);
        assert!(ctx.logs.iter().any(|l| l.contains("delivered 1 message")));
        assert!(ctx.logs.iter().any(|l| l.contains("duplicate, re-ack 0")));
    }

    #[test]
    fn sr_duplicate_buffering_is_idempotent() {
        let mut ctx = MockCtx::with_window(4);
        let mut r = receiver(ProtocolMode::SelectiveRepeat, &mut ctx);
        r.on_data(&mut ctx, &data(1, b"m2"));
        r.on_data(&mut ctx, &data(1, b"m2"));
        r.on_data(&mut ctx, &data(0, b"m1"));

        assert_eq!(ctx.delivered.len(), 2);
        assert_eq!(r.expected(), 2);
    }
}

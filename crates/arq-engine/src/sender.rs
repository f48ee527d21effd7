//! Sender-side state machine, parameterized by protocol mode.
//!
//! The three variants share one window/sequence core and differ only in
//! acknowledgment handling and timer policy: Alternating-Bit and Go-Back-N
//! treat ACKs as cumulative and keep a single timer on the oldest unacked
//! packet; Selective-Repeat marks individual records and resends from a
//! periodic scan.

use std::collections::VecDeque;

use arq_abstract::{MessageBlock, Packet, ProtocolEndpoint, ProtocolMode, SimContext, message_block};

use crate::outcome::{AckOutcome, DropReason, SubmitOutcome};
use crate::timer::{RETRANSMIT_TIMER, TimerPolicy};
use crate::window::{OutstandingRecord, SlotRing};

pub struct Sender {
    mode: ProtocolMode,
    timers: TimerPolicy,
    /// Window size `W`; fixed to 1 for Alternating-Bit, read from the
    /// emulator configuration at init otherwise.
    window: u32,
    /// Oldest unacknowledged sequence number; lower edge of the window.
    base: u64,
    /// Next sequence number to assign to a message entering the window.
    next_seq: u64,
    /// Last acknowledgment sequence seen from the peer, echoed into
    /// outbound data packets.
    ack_echo: u64,
    outstanding: SlotRing<OutstandingRecord>,
    /// Messages submitted while the window was full, oldest first. They
    /// receive their sequence numbers only when they enter the window, so
    /// `next_seq - base <= W` holds at all times.
    backlog: VecDeque<MessageBlock>,
}

impl Sender {
    pub fn new(mode: ProtocolMode) -> Self {
        Self {
            mode,
            timers: TimerPolicy::for_mode(mode),
            window: 1,
            base: 0,
            next_seq: 0,
            ack_echo: 0,
            outstanding: SlotRing::new(2),
            backlog: VecDeque::new(),
        }
    }

    /// Override the default per-mode timer durations.
    pub fn with_timers(mut self, timers: TimerPolicy) -> Self {
        self.timers = timers;
        self
    }

    pub fn mode(&self) -> ProtocolMode {
        self.mode
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    fn configure(&mut self, ctx: &mut dyn SimContext) {
        self.window = match self.mode {
            ProtocolMode::AlternatingBit => 1,
            _ => ctx.window_size().max(1),
        };
        let capacity = match self.mode {
            ProtocolMode::AlternatingBit => 2,
            _ => self.window as usize,
        };
        self.outstanding = SlotRing::new(capacity);
        // The periodic scan runs for the whole session, independent of
        // window occupancy.
        if let TimerPolicy::PeriodicScan { tick_ms, .. } = self.timers {
            ctx.arm_timer(tick_ms, RETRANSMIT_TIMER);
        }
    }

    fn has_room(&self) -> bool {
        self.next_seq - self.base < self.window as u64
    }

    /// One past the highest sequence number currently coverable by the
    /// window: `min(base + W, next_seq)`.
    fn window_end(&self) -> u64 {
        (self.base + self.window as u64).min(self.next_seq)
    }

    /// Rebuild and transmit the packet for an in-window record, stamping
    /// its send time.
    fn transmit(&mut self, ctx: &mut dyn SimContext, seq: u64) {
        let ack_echo = self.ack_echo;
        let Some(record) = self.outstanding.get_mut(seq) else {
            return;
        };
        record.last_sent = ctx.now();
        ctx.transmit(Packet::data(seq, ack_echo, record.payload));
    }

    /// Accept one message from the application. Transmits immediately when
    /// the window has room, queues otherwise.
    pub fn submit(&mut self, ctx: &mut dyn SimContext, payload: MessageBlock) -> SubmitOutcome {
        if !self.has_room() {
            self.backlog.push_back(payload);
            return SubmitOutcome::Queued {
                backlog: self.backlog.len(),
            };
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.outstanding.insert(seq, OutstandingRecord::new(payload));
        self.transmit(ctx, seq);

        // First outstanding packet arms the single-timer policies.
        if let TimerPolicy::OldestUnacked { timeout_ms } = self.timers {
            if seq == self.base {
                ctx.arm_timer(timeout_ms, RETRANSMIT_TIMER);
            }
        }
        ctx.record_metric("in_flight", (self.next_seq - self.base) as f64);
        SubmitOutcome::Sent { seq }
    }

    /// Process one inbound acknowledgment packet.
    pub fn on_ack(&mut self, ctx: &mut dyn SimContext, packet: &Packet) -> AckOutcome {
        if !packet.is_intact() {
            return AckOutcome::Ignored(DropReason::Corrupt);
        }
        let ack = packet.acknum;
        if ack < self.base || ack >= self.window_end() {
            return AckOutcome::Ignored(DropReason::OutOfWindow);
        }
        self.ack_echo = packet.seqnum;

        let outcome = match self.mode {
            ProtocolMode::AlternatingBit | ProtocolMode::GoBackN => {
                self.slide_cumulative(ctx, ack)
            }
            ProtocolMode::SelectiveRepeat => self.mark_selective(ack),
        };
        self.refill(ctx);
        if let TimerPolicy::OldestUnacked { timeout_ms } = self.timers {
            if self.base < self.next_seq {
                ctx.arm_timer(timeout_ms, RETRANSMIT_TIMER);
            }
        }
        ctx.record_metric("in_flight", (self.next_seq - self.base) as f64);
        outcome
    }

    /// Cumulative ACK: everything up to and including `ack` is done. The
    /// timer is stopped unconditionally here; `on_ack` re-arms it if
    /// packets remain unacked.
    fn slide_cumulative(&mut self, ctx: &mut dyn SimContext, ack: u64) -> AckOutcome {
        for seq in self.base..=ack {
            self.outstanding.take(seq);
        }
        self.base = ack + 1;
        ctx.disarm_timer(RETRANSMIT_TIMER);
        AckOutcome::Slid { new_base: self.base }
    }

    /// Selective ACK: mark the one record, then slide past whatever
    /// contiguous acked prefix that creates, one slot at a time.
    fn mark_selective(&mut self, ack: u64) -> AckOutcome {
        if let Some(record) = self.outstanding.get_mut(ack) {
            record.acked = true;
        }
        let before = self.base;
        while self
            .outstanding
            .get(self.base)
            .is_some_and(|record| record.acked)
        {
            self.outstanding.take(self.base);
            self.base += 1;
        }
        if self.base > before {
            AckOutcome::Slid { new_base: self.base }
        } else {
            AckOutcome::Marked { seq: ack }
        }
    }

    /// Move queued messages into window slots freed by a slide and
    /// transmit them.
    fn refill(&mut self, ctx: &mut dyn SimContext) {
        while self.has_room() {
            let Some(payload) = self.backlog.pop_front() else {
                break;
            };
            let seq = self.next_seq;
            self.next_seq += 1;
            self.outstanding.insert(seq, OutstandingRecord::new(payload));
            self.transmit(ctx, seq);
        }
    }

    /// Retransmission timer expired. Returns how many packets went back on
    /// the channel.
    pub fn on_timeout(&mut self, ctx: &mut dyn SimContext) -> usize {
        match self.timers {
            // Whole-window resend; with W = 1 this is exactly the oldest
            // unacked packet, which covers Alternating-Bit as well.
            TimerPolicy::OldestUnacked { timeout_ms } => {
                let end = self.window_end();
                for seq in self.base..end {
                    self.transmit(ctx, seq);
                }
                let resent = (end - self.base) as usize;
                if resent > 0 {
                    ctx.arm_timer(timeout_ms, RETRANSMIT_TIMER);
                }
                resent
            }
            // Per-packet scan: resend whatever is unacked and overdue,
            // then re-arm the tick no matter what happened.
            TimerPolicy::PeriodicScan {
                tick_ms,
                resend_after_ms,
            } => {
                let now = ctx.now();
                let end = self.window_end();
                let mut resent = 0;
                for seq in self.base..end {
                    let overdue = self
                        .outstanding
                        .get(seq)
                        .is_some_and(|r| !r.acked && r.last_sent + resend_after_ms <= now);
                    if overdue {
                        self.transmit(ctx, seq);
                        resent += 1;
                    }
                }
                ctx.arm_timer(tick_ms, RETRANSMIT_TIMER);
                resent
            }
        }
    }
}

impl ProtocolEndpoint for Sender {
    fn init(&mut self, ctx: &mut dyn SimContext) {
        self.configure(ctx);
        ctx.log(&format!(
            "{} sender ready (window={})",
            self.mode, self.window
        ));
    }

    fn on_message(&mut self, ctx: &mut dyn SimContext, data: &[u8]) {
        let block = message_block(data);
        match self.submit(ctx, block) {
            SubmitOutcome::Sent { seq } => {
                ctx.log(&format!("{} send seq={}", self.mode, seq));
            }
            SubmitOutcome::Queued { backlog } => {
                ctx.log(&format!(
                    "{} window full, queued message ({} waiting)",
                    self.mode, backlog
                ));
            }
        }
    }

    fn on_packet(&mut self, ctx: &mut dyn SimContext, packet: Packet) {
        match self.on_ack(ctx, &packet) {
            AckOutcome::Slid { new_base } => {
                ctx.log(&format!(
                    "{} ack={} slides base to {}",
                    self.mode, packet.acknum, new_base
                ));
            }
            AckOutcome::Marked { seq } => {
                ctx.log(&format!("{} ack={} marked, base unchanged", self.mode, seq));
            }
            AckOutcome::Ignored(DropReason::Corrupt) => {
                ctx.log(&format!("{} dropping corrupt ack", self.mode));
            }
            AckOutcome::Ignored(DropReason::OutOfWindow) => {
                ctx.log(&format!(
                    "{} dropping out-of-window ack={}",
                    self.mode, packet.acknum
                ));
            }
        }
    }

    fn on_timer(&mut self, ctx: &mut dyn SimContext, timer_id: u32) {
        if timer_id != RETRANSMIT_TIMER {
            return;
        }
        let resent = self.on_timeout(ctx);
        if resent > 0 {
            ctx.log(&format!("{} timeout, resent {} packet(s)", self.mode, resent));
        }
    }
}

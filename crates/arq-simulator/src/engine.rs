use crate::trace::SimulationReport;
use rand::Rng;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use arq_abstract::{Packet, ProtocolEndpoint, SimConfig, SimContext};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

#[derive(Debug)]
pub enum EventType {
    PacketArrival {
        to: NodeId,
        packet: Packet,
    },
    TimerExpiry {
        node: NodeId,
        timer_id: u32,
        generation: u64,
    },
    AppSend {
        data: Vec<u8>,
    },
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64, // breaks ties between events scheduled for the same instant
}

// Reverse ordering so the BinaryHeap pops the earliest event first.
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A compact textual summary of one link-layer event, for traces and
/// assertion debugging.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: u64,
    pub description: String,
}

/// Outward calls buffered during one endpoint entry-point run.
#[derive(Default)]
struct ActionBuffer {
    outgoing_packets: Vec<Packet>,
    timers_armed: Vec<(u64, u32)>, // (delay, id)
    timers_disarmed: Vec<u32>,
    logs: Vec<String>,
    delivered_data: Vec<Vec<u8>>,
    metrics: Vec<(String, f64)>,
}

/// Context handed to an endpoint for the duration of one entry point.
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: u64,
    window_size: u32,
}

impl<'a> SimContext for ScopedContext<'a> {
    fn transmit(&mut self, packet: Packet) {
        self.buffer.outgoing_packets.push(packet);
    }

    fn deliver(&mut self, data: &[u8]) {
        self.buffer.delivered_data.push(data.to_vec());
    }

    fn arm_timer(&mut self, delay_ms: u64, timer_id: u32) {
        self.buffer.timers_armed.push((delay_ms, timer_id));
    }

    fn disarm_timer(&mut self, timer_id: u32) {
        self.buffer.timers_disarmed.push(timer_id);
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn window_size(&self) -> u32 {
        self.window_size
    }

    fn log(&mut self, message: &str) {
        self.buffer.logs.push(message.to_string());
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.buffer.metrics.push((name.to_string(), value));
    }
}

pub struct Simulator {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,
    initialized: bool,

    config: SimConfig,
    rng: rand::rngs::StdRng,

    pub sender: Box<dyn ProtocolEndpoint>,
    pub receiver: Box<dyn ProtocolEndpoint>,

    /// Payloads handed to the application sink, in delivery order.
    pub delivered_data: Vec<Vec<u8>>,
    /// Total packets the sender side put on the channel.
    pub sender_packet_count: u32,
    /// `(time, seqnum)` for every sender packet, retransmissions included.
    pub sender_packet_log: Vec<(u64, u64)>,

    /// Time-series metrics recorded via `SimContext::record_metric`.
    pub metrics: HashMap<String, Vec<(u64, f64)>>,

    // Deterministic fault injection, each consumed on first match.
    drop_sender_seq_once: Vec<u64>,
    drop_receiver_ack_once: Vec<u64>,
    corrupt_sender_seq_once: Vec<u64>,
    corrupt_receiver_ack_once: Vec<u64>,

    /// Timeline of sends, drops, corruptions and deliveries.
    pub link_events: Vec<LinkEventSummary>,

    /// Timer generations; a disarm bumps the generation so the already
    /// queued expiry is skipped when it surfaces.
    timer_generations: HashMap<(NodeId, u32), u64>,
}

impl Simulator {
    pub fn new(
        config: SimConfig,
        sender: Box<dyn ProtocolEndpoint>,
        receiver: Box<dyn ProtocolEndpoint>,
    ) -> Self {
        use rand::SeedableRng;
        let rng = rand::rngs::StdRng::seed_from_u64(config.seed);

        Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            initialized: false,
            config,
            rng,
            sender,
            receiver,
            delivered_data: Vec::new(),
            sender_packet_count: 0,
            sender_packet_log: Vec::new(),
            metrics: HashMap::new(),
            drop_sender_seq_once: Vec::new(),
            drop_receiver_ack_once: Vec::new(),
            corrupt_sender_seq_once: Vec::new(),
            corrupt_receiver_ack_once: Vec::new(),
            link_events: Vec::new(),
            timer_generations: HashMap::new(),
        }
    }

    /// Drop the first sender packet whose seqnum equals `seq`.
    pub fn add_drop_sender_seq_once(&mut self, seq: u64) {
        self.drop_sender_seq_once.push(seq);
    }

    /// Drop the first receiver packet whose acknum equals `ack`.
    pub fn add_drop_receiver_ack_once(&mut self, ack: u64) {
        self.drop_receiver_ack_once.push(ack);
    }

    /// Corrupt the first sender packet whose seqnum equals `seq`.
    pub fn add_corrupt_sender_seq_once(&mut self, seq: u64) {
        self.corrupt_sender_seq_once.push(seq);
    }

    /// Corrupt the first receiver packet whose acknum equals `ack`.
    pub fn add_corrupt_receiver_ack_once(&mut self, ack: u64) {
        self.corrupt_receiver_ack_once.push(ack);
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// `(time_ms, value)` samples for a named metric, if any were recorded.
    pub fn metric_series(&self, name: &str) -> Option<&[(u64, f64)]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    pub fn schedule_app_send(&mut self, time: u64, data: Vec<u8>) {
        self.push_event(time, EventType::AppSend { data });
    }

    /// Run both endpoints' init hooks. Called automatically by the run
    /// helpers; safe to call repeatedly.
    pub fn init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        for node in [NodeId::Sender, NodeId::Receiver] {
            let mut buffer = ActionBuffer::default();
            {
                let mut ctx = ScopedContext {
                    buffer: &mut buffer,
                    now: self.time,
                    window_size: self.config.window_size,
                };
                match node {
                    NodeId::Sender => self.sender.init(&mut ctx),
                    NodeId::Receiver => self.receiver.init(&mut ctx),
                }
            }
            self.process_actions(node, buffer);
        }
    }

    pub fn peek_next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Process the next event. Returns false once the queue is empty.
    pub fn step(&mut self) -> bool {
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return false,
        };

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        match event.event_type {
            EventType::PacketArrival { to, packet } => {
                let mut buffer = ActionBuffer::default();
                {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                        window_size: self.config.window_size,
                    };
                    match to {
                        NodeId::Sender => self.sender.on_packet(&mut ctx, packet),
                        NodeId::Receiver => self.receiver.on_packet(&mut ctx, packet),
                    }
                }
                self.process_actions(to, buffer);
            }
            EventType::TimerExpiry {
                node,
                timer_id,
                generation,
            } => {
                // A disarm bumps the stored generation; a stale expiry is
                // consumed without reaching the endpoint.
                let key = (node, timer_id);
                match self.timer_generations.get(&key) {
                    Some(&current) if current == generation => {}
                    _ => {
                        debug!("Skipping stale timer event for timer_id={}", timer_id);
                        return true;
                    }
                }

                let mut buffer = ActionBuffer::default();
                {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                        window_size: self.config.window_size,
                    };
                    match node {
                        NodeId::Sender => self.sender.on_timer(&mut ctx, timer_id),
                        NodeId::Receiver => self.receiver.on_timer(&mut ctx, timer_id),
                    }
                }
                self.process_actions(node, buffer);
            }
            EventType::AppSend { data } => {
                let mut buffer = ActionBuffer::default();
                {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                        window_size: self.config.window_size,
                    };
                    self.sender.on_message(&mut ctx, &data);
                }
                self.process_actions(NodeId::Sender, buffer);
            }
        }
        true
    }

    /// Drain the event queue completely. Only suitable for runs whose
    /// timers eventually go quiet (Alternating-Bit, Go-Back-N); the
    /// Selective-Repeat tick re-arms forever, so use `run_for` there.
    pub fn run_until_complete(&mut self) {
        self.init();
        while self.step() {}
    }

    /// Run until the queue is empty or the next event lies past
    /// `deadline_ms` of simulated time.
    pub fn run_for(&mut self, deadline_ms: u64) {
        self.init();
        while let Some(next) = self.peek_next_event_time() {
            if next > deadline_ms {
                break;
            }
            self.step();
        }
    }

    /// Serializable snapshot of the finished (or paused) simulation.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            duration_ms: self.time,
            delivered_data: self.delivered_data.clone(),
            sender_packet_count: self.sender_packet_count,
            sender_packet_log: self.sender_packet_log.clone(),
            metrics: self.metrics.clone(),
            link_events: self.link_events.clone(),
        }
    }

    fn link_event(&mut self, description: String) {
        self.link_events.push(LinkEventSummary {
            time: self.time,
            description,
        });
    }

    /// Consume a pending one-shot fault matching `value`, if any.
    fn take_fault(list: &mut Vec<u64>, value: u64) -> bool {
        if let Some(pos) = list.iter().position(|v| *v == value) {
            list.remove(pos);
            true
        } else {
            false
        }
    }

    fn process_actions(&mut self, source_node: NodeId, buffer: ActionBuffer) {
        for (name, value) in buffer.metrics {
            self.metrics
                .entry(name)
                .or_default()
                .push((self.time, value));
        }

        for log in buffer.logs {
            info!("[{:?}] {}", source_node, log);
        }

        for data in buffer.delivered_data {
            info!("[{:?}] DELIVERED {} bytes", source_node, data.len());
            self.link_event(format!(
                "[{:?}] DELIVERED {} bytes to application",
                source_node,
                data.len()
            ));
            self.delivered_data.push(data);
        }

        for timer_id in buffer.timers_disarmed {
            let key = (source_node, timer_id);
            let generation = self.timer_generations.entry(key).or_insert(0);
            *generation += 1;
        }

        for (delay, id) in buffer.timers_armed {
            let key = (source_node, id);
            let generation = *self.timer_generations.entry(key).or_insert(0);
            self.push_event(
                self.time + delay,
                EventType::TimerExpiry {
                    node: source_node,
                    timer_id: id,
                    generation,
                },
            );
        }

        for mut packet in buffer.outgoing_packets {
            match source_node {
                NodeId::Sender => {
                    self.sender_packet_count += 1;
                    self.sender_packet_log.push((self.time, packet.seqnum));

                    if Self::take_fault(&mut self.drop_sender_seq_once, packet.seqnum) {
                        self.link_event(format!(
                            "[Sender->Receiver] DROP (scripted) seq={}",
                            packet.seqnum
                        ));
                        debug!("Scripted drop of sender packet seq={}", packet.seqnum);
                        continue;
                    }
                    if Self::take_fault(&mut self.corrupt_sender_seq_once, packet.seqnum) {
                        self.link_event(format!(
                            "[Sender->Receiver] CORRUPT (scripted) seq={}",
                            packet.seqnum
                        ));
                        packet.checksum = !packet.checksum;
                    }
                }
                NodeId::Receiver => {
                    if Self::take_fault(&mut self.drop_receiver_ack_once, packet.acknum) {
                        self.link_event(format!(
                            "[Receiver->Sender] DROP (scripted) ack={}",
                            packet.acknum
                        ));
                        debug!("Scripted drop of receiver ack={}", packet.acknum);
                        continue;
                    }
                    if Self::take_fault(&mut self.corrupt_receiver_ack_once, packet.acknum) {
                        self.link_event(format!(
                            "[Receiver->Sender] CORRUPT (scripted) ack={}",
                            packet.acknum
                        ));
                        packet.checksum = !packet.checksum;
                    }
                }
            }

            // 1. Random loss.
            if self.rng.random::<f64>() < self.config.loss_rate {
                self.link_event(format!(
                    "[{:?}->{:?}] DROP (random loss) seq={} ack={}",
                    source_node,
                    source_node.peer(),
                    packet.seqnum,
                    packet.acknum
                ));
                debug!("Packet lost in channel");
                continue;
            }

            // 2. Random corruption: usually a payload byte, sometimes a
            // header field, so both kinds of damage get exercised.
            if self.rng.random::<f64>() < self.config.corrupt_rate {
                self.link_event(format!(
                    "[{:?}->{:?}] CORRUPT seq={} ack={}",
                    source_node,
                    source_node.peer(),
                    packet.seqnum,
                    packet.acknum
                ));
                debug!("Packet corrupted in channel");
                let roll = self.rng.random::<f64>();
                if roll < 0.75 {
                    packet.payload[0] = packet.payload[0].wrapping_add(1);
                } else if roll < 0.875 {
                    packet.seqnum = packet.seqnum.wrapping_add(1);
                } else {
                    packet.acknum = packet.acknum.wrapping_add(1);
                }
            }

            // 3. Latency.
            let latency = self
                .rng
                .random_range(self.config.min_latency..=self.config.max_latency);
            let arrival_time = self.time + latency;

            let target_node = source_node.peer();
            self.link_event(format!(
                "[{:?}->{:?}] SEND seq={} ack={} (latency={}ms)",
                source_node, target_node, packet.seqnum, packet.acknum, latency
            ));

            self.push_event(
                arrival_time,
                EventType::PacketArrival {
                    to: target_node,
                    packet,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Simulator;
    use arq_abstract::{Packet, ProtocolEndpoint, SimConfig, SimContext};

    /// Arms timer 0, then cancels it from timer 1's expiry. If the cancel
    /// works, timer 0 never fires and nothing reaches the sink.
    struct CancelProbe;

    impl ProtocolEndpoint for CancelProbe {
        fn init(&mut self, ctx: &mut dyn SimContext) {
            ctx.arm_timer(10, 0);
            ctx.arm_timer(5, 1);
        }

        fn on_message(&mut self, _ctx: &mut dyn SimContext, _data: &[u8]) {}

        fn on_packet(&mut self, _ctx: &mut dyn SimContext, _packet: Packet) {}

        fn on_timer(&mut self, ctx: &mut dyn SimContext, timer_id: u32) {
            match timer_id {
                0 => ctx.deliver(b"timer 0 fired"),
                1 => ctx.disarm_timer(0),
                _ => {}
            }
        }
    }

    /// Inert endpoint for the uninteresting side of a probe.
    struct Quiet;

    impl ProtocolEndpoint for Quiet {
        fn on_message(&mut self, _ctx: &mut dyn SimContext, _data: &[u8]) {}
        fn on_packet(&mut self, _ctx: &mut dyn SimContext, _packet: Packet) {}
        fn on_timer(&mut self, _ctx: &mut dyn SimContext, _timer_id: u32) {}
    }

    /// Echoes every intact inbound packet's seqnum as a control packet.
    struct Echo;

    impl ProtocolEndpoint for Echo {
        fn on_message(&mut self, _ctx: &mut dyn SimContext, _data: &[u8]) {}
        fn on_packet(&mut self, ctx: &mut dyn SimContext, packet: Packet) {
            if packet.is_intact() {
                ctx.transmit(Packet::control(0, packet.seqnum));
            }
        }
        fn on_timer(&mut self, _ctx: &mut dyn SimContext, _timer_id: u32) {}
    }

    /// Sends one data packet per app message and delivers every ack it
    /// gets back, so tests can observe what crossed the channel.
    struct Blaster {
        next_seq: u64,
    }

    impl ProtocolEndpoint for Blaster {
        fn on_message(&mut self, ctx: &mut dyn SimContext, data: &[u8]) {
            let packet = Packet::data(self.next_seq, 0, arq_abstract::message_block(data));
            self.next_seq += 1;
            ctx.transmit(packet);
        }
        fn on_packet(&mut self, ctx: &mut dyn SimContext, packet: Packet) {
            if packet.is_intact() {
                ctx.deliver(&packet.acknum.to_be_bytes());
            }
        }
        fn on_timer(&mut self, _ctx: &mut dyn SimContext, _timer_id: u32) {}
    }

    #[test]
    fn disarmed_timer_never_fires() {
        let mut sim = Simulator::new(
            SimConfig::default(),
            Box::new(CancelProbe),
            Box::new(Quiet),
        );
        sim.run_until_complete();
        assert!(sim.delivered_data.is_empty());
    }

    #[test]
    fn scripted_drop_consumes_exactly_one_packet() {
        let mut sim = Simulator::new(
            SimConfig::default(),
            Box::new(Blaster { next_seq: 0 }),
            Box::new(Echo),
        );
        sim.add_drop_sender_seq_once(0);
        sim.schedule_app_send(10, b"a".to_vec());
        sim.schedule_app_send(20, b"b".to_vec());
        sim.run_until_complete();

        // Seq 0 was dropped once, so only seq 1's echo comes back.
        assert_eq!(sim.delivered_data, vec![1u64.to_be_bytes().to_vec()]);
        assert_eq!(sim.sender_packet_count, 2);
    }

    #[test]
    fn scripted_corruption_fails_the_checksum() {
        let mut sim = Simulator::new(
            SimConfig::default(),
            Box::new(Blaster { next_seq: 0 }),
            Box::new(Echo),
        );
        sim.add_corrupt_sender_seq_once(0);
        sim.schedule_app_send(10, b"a".to_vec());
        sim.run_until_complete();

        // The echo side verifies checksums, so the mangled frame dies there.
        assert!(sim.delivered_data.is_empty());
        assert!(
            sim.link_events
                .iter()
                .any(|e| e.description.contains("CORRUPT (scripted) seq=0"))
        );
    }

    #[test]
    fn full_loss_delivers_nothing() {
        let config = SimConfig {
            loss_rate: 1.0,
            ..Default::default()
        };
        let mut sim = Simulator::new(
            config,
            Box::new(Blaster { next_seq: 0 }),
            Box::new(Echo),
        );
        sim.schedule_app_send(10, b"a".to_vec());
        sim.run_until_complete();
        assert!(sim.delivered_data.is_empty());
    }

    #[test]
    fn run_for_stops_at_the_deadline() {
        let mut sim = Simulator::new(
            SimConfig::default(),
            Box::new(Blaster { next_seq: 0 }),
            Box::new(Echo),
        );
        sim.schedule_app_send(10, b"a".to_vec());
        sim.schedule_app_send(5_000, b"b".to_vec());
        sim.run_for(1_000);

        assert_eq!(sim.sender_packet_count, 1);
        assert_eq!(sim.remaining_events(), 1);
    }
}

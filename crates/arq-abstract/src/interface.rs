use crate::packet::Packet;

/// The services the emulator provides to a protocol endpoint. Endpoints
/// call these to interact with the channel, the application sink, and the
/// timer facility; they never touch the event queue directly.
pub trait SimContext {
    /// Hand a packet to the unreliable channel.
    fn transmit(&mut self, packet: Packet);

    /// Hand an in-order payload up to the application sink.
    fn deliver(&mut self, data: &[u8]);

    /// Arm a timer. `timer_id` distinguishes timers owned by the same
    /// endpoint; arming the same id twice without a disarm queues two
    /// expiries, so endpoints disarm before re-arming.
    fn arm_timer(&mut self, delay_ms: u64, timer_id: u32);

    /// Disarm a timer that has not fired yet. Disarming an unknown id is a
    /// no-op.
    fn disarm_timer(&mut self, timer_id: u32);

    /// Current simulated time in milliseconds.
    fn now(&self) -> u64;

    /// Window size configured on the emulator for this run.
    fn window_size(&self) -> u32;

    /// Append a line to the emulator's debug output.
    fn log(&mut self, message: &str);

    /// Record a numeric sample for later inspection (window occupancy and
    /// the like). Default no-op so bare harnesses don't need to care.
    fn record_metric(&mut self, _name: &str, _value: f64) {}
}

/// One side of the transfer. The emulator delivers exactly one event at a
/// time to one endpoint, which runs to completion; all window and sequence
/// state is owned by the endpoint itself.
pub trait ProtocolEndpoint {
    /// Called once, before any other entry point for this side.
    fn init(&mut self, _ctx: &mut dyn SimContext) {}

    /// The application has a message ready to send. Must not block; if the
    /// window is full the endpoint queues the message for later.
    fn on_message(&mut self, ctx: &mut dyn SimContext, data: &[u8]);

    /// A packet arrived from the channel. It may be corrupted; nothing in
    /// it can be trusted before the checksum is verified.
    fn on_packet(&mut self, ctx: &mut dyn SimContext, packet: Packet);

    /// An armed timer elapsed.
    fn on_timer(&mut self, ctx: &mut dyn SimContext, timer_id: u32);
}

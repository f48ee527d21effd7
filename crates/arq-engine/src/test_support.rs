//! Recording context for state-machine unit tests.

use arq_abstract::{Packet, SimContext};

#[derive(Default)]
pub(crate) struct MockCtx {
    pub transmitted: Vec<Packet>,
    pub delivered: Vec<Vec<u8>>,
    pub armed: Vec<(u64, u32)>,
    pub disarmed: Vec<u32>,
    pub logs: Vec<String>,
    pub metrics: Vec<(String, f64)>,
    pub now: u64,
    pub window: u32,
}

impl MockCtx {
    pub fn with_window(window: u32) -> Self {
        Self {
            window,
            ..Self::default()
        }
    }
}

impl SimContext for MockCtx {
    fn transmit(&mut self, packet: Packet) {
        self.transmitted.push(packet);
    }

    fn deliver(&mut self, data: &[u8]) {
        self.delivered.push(data.to_vec());
    }

    fn arm_timer(&mut self, delay_ms: u64, timer_id: u32) {
        self.armed.push((delay_ms, timer_id));
    }

    fn disarm_timer(&mut self, timer_id: u32) {
        self.disarmed.push(timer_id);
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn window_size(&self) -> u32 {
        self.window
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.metrics.push((name.to_string(), value));
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which retransmission discipline the endpoint pair runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolMode {
    /// Stop-and-wait, window of one, single timer.
    AlternatingBit,
    /// Cumulative ACKs, sliding window, one timer on the oldest packet.
    GoBackN,
    /// Individual ACKs, per-packet resend tracking, receiver-side buffering.
    SelectiveRepeat,
}

impl FromStr for ProtocolMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abt" | "alternating-bit" => Ok(Self::AlternatingBit),
            "gbn" | "go-back-n" => Ok(Self::GoBackN),
            "sr" | "selective-repeat" => Ok(Self::SelectiveRepeat),
            other => Err(format!(
                "unknown protocol mode '{other}' (expected abt, gbn or sr)"
            )),
        }
    }
}

impl fmt::Display for ProtocolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AlternatingBit => "abt",
            Self::GoBackN => "gbn",
            Self::SelectiveRepeat => "sr",
        };
        f.write_str(name)
    }
}

/// Channel and emulator parameters. The window size lives here because the
/// emulator owns it and hands it to both endpoints at init time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub min_latency: u64,
    pub max_latency: u64,
    pub seed: u64,
    pub window_size: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            min_latency: 10,
            max_latency: 100,
            seed: 0,
            window_size: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_short_and_long_names() {
        assert_eq!("abt".parse::<ProtocolMode>(), Ok(ProtocolMode::AlternatingBit));
        assert_eq!("Go-Back-N".parse::<ProtocolMode>(), Ok(ProtocolMode::GoBackN));
        assert_eq!("sr".parse::<ProtocolMode>(), Ok(ProtocolMode::SelectiveRepeat));
        assert!("tcp".parse::<ProtocolMode>().is_err());
    }

    #[test]
    fn mode_display_round_trips() {
        for mode in [
            ProtocolMode::AlternatingBit,
            ProtocolMode::GoBackN,
            ProtocolMode::SelectiveRepeat,
        ] {
            assert_eq!(mode.to_string().parse::<ProtocolMode>(), Ok(mode));
        }
    }
}

//! GPU memory samples, polled from the external VRAM probe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single GPU memory sample. Only the latest reading is authoritative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VRAMReading {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub sampled_at: DateTime<Utc>,
}

impl VRAMReading {
    pub fn free_ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.free_bytes as f64 / self.total_bytes as f64
        }
    }
}

/// Result of a VRAM probe. Probe failures fall back to `Unknown` rather than
/// crashing the monitor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum VRAMSample {
    Reading(VRAMReading),
    Unknown,
}

/// UI-facing tier label, a pure function of `window_tokens` — never the
/// driver of size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    T1,
    T2,
    T3,
    T4,
    T5,
}

impl Tier {
    pub fn for_window_tokens(window_tokens: usize) -> Tier {
        match window_tokens {
            0..=2047 => Tier::T1,
            2048..=4095 => Tier::T2,
            4096..=8191 => Tier::T3,
            8192..=16383 => Tier::T4,
            _ => Tier::T5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_is_a_pure_function_of_window_tokens() {
        assert_eq!(Tier::for_window_tokens(4096), Tier::T3);
        assert_eq!(Tier::for_window_tokens(4096), Tier::for_window_tokens(4096));
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(Tier::for_window_tokens(2047), Tier::T1);
        assert_eq!(Tier::for_window_tokens(2048), Tier::T2);
        assert_eq!(Tier::for_window_tokens(65536), Tier::T5);
    }
}

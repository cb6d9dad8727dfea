//! Throughput derivation and unit classification

use serde::Serialize;
use std::fmt;

/// Display unit chosen by magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThroughputUnit {
    Bps,
    Kbps,
    Mbps,
}

impl ThroughputUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThroughputUnit::Bps => "bps",
            ThroughputUnit::Kbps => "kbps",
            ThroughputUnit::Mbps => "mbps",
        }
    }
}

impl fmt::Display for ThroughputUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload bits per second of wall time
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Throughput {
    pub bits_per_second: f64,
    /// Integer-truncated value in `unit`
    pub value: u64,
    pub unit: ThroughputUnit,
}

impl Throughput {
    pub fn from_bits_per_second(bits_per_second: f64) -> Self {
        let (value, unit) = classify(bits_per_second);
        Self {
            bits_per_second,
            value,
            unit,
        }
    }

    /// `None` when `seconds` is not a positive, finite number
    pub fn from_transfer(bytes: u64, seconds: f64) -> Option<Self> {
        if !(seconds.is_finite() && seconds > 0.0) {
            return None;
        }
        Some(Self::from_bits_per_second(bytes as f64 * 8.0 / seconds))
    }
}

/// Below 1000 is bps, below 1,000,000 is kbps, anything larger mbps
pub fn classify(bits_per_second: f64) -> (u64, ThroughputUnit) {
    if bits_per_second < 1_000.0 {
        (bits_per_second as u64, ThroughputUnit::Bps)
    } else if bits_per_second < 1_000_000.0 {
        ((bits_per_second / 1_000.0) as u64, ThroughputUnit::Kbps)
    } else {
        ((bits_per_second / 1_000_000.0) as u64, ThroughputUnit::Mbps)
    }
}

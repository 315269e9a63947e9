//! Decoded CSI samples.

use chrono::{DateTime, TimeZone, Utc};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use wavesense_core::DeviceId;

/// One decoded CSI frame from a transmitter.
///
/// `csi` carries one complex channel response per subcarrier slot, before
/// masking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsiSample {
    /// Capture time
    pub timestamp: DateTime<Utc>,

    /// Transmitter identifier (MAC address)
    pub device_id: DeviceId,

    /// Channel response per subcarrier slot
    pub csi: Vec<Complex<f64>>,
}

impl CsiSample {
    pub fn new(timestamp: DateTime<Utc>, device_id: impl Into<DeviceId>, csi: Vec<Complex<f64>>) -> Self {
        Self {
            timestamp,
            device_id: device_id.into(),
            csi,
        }
    }

    /// Build a sample stamped with fractional Unix seconds.
    pub fn at_seconds(seconds: f64, device_id: impl Into<DeviceId>, csi: Vec<Complex<f64>>) -> Self {
        let secs = seconds.floor();
        let nanos = (((seconds - secs) * 1e9).round() as u32).min(999_999_999);
        let timestamp = Utc.timestamp_opt(secs as i64, nanos).single().unwrap_or_default();
        Self::new(timestamp, device_id, csi)
    }

    /// Capture time as fractional Unix seconds.
    pub fn unix_seconds(&self) -> f64 {
        self.timestamp.timestamp() as f64 + self.timestamp.timestamp_subsec_nanos() as f64 * 1e-9
    }

    pub fn subcarrier_count(&self) -> usize {
        self.csi.len()
    }

    /// Non-empty and every value finite.
    pub fn is_valid(&self) -> bool {
        !self.csi.is_empty() && self.csi.iter().all(|c| c.re.is_finite() && c.im.is_finite())
    }
}

/// Amplitude of `value` in dB; a zero magnitude maps to 0 dB.
pub fn amplitude_db(value: Complex<f64>) -> f64 {
    let magnitude = value.norm();
    let magnitude = if magnitude == 0.0 { 1.0 } else { magnitude };
    20.0 * magnitude.log10()
}

//! Fundamental types for the wavesense system.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of OFDM subcarrier slots reported per CSI frame (80 MHz Nexmon capture).
pub const SUBCARRIER_SLOTS: usize = 256;

/// Transmitter identifier, usually the source MAC address as text.
pub type DeviceId = String;

/// Boolean selection of the subcarriers retained for processing.
///
/// The mask always has one entry per reported subcarrier slot; incoming CSI
/// vectors are checked against its length before any column is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcarrierMask(Vec<bool>);

impl SubcarrierMask {
    /// Keep every subcarrier.
    pub fn all() -> Self {
        Self(vec![true; SUBCARRIER_SLOTS])
    }

    /// Build a mask from explicit flags; the length must match [`SUBCARRIER_SLOTS`].
    pub fn from_flags(flags: Vec<bool>) -> Result<Self> {
        if flags.len() != SUBCARRIER_SLOTS {
            return Err(Error::InvalidMask {
                expected: SUBCARRIER_SLOTS,
                actual: flags.len(),
            });
        }
        Ok(Self(flags))
    }

    /// Usable subcarriers of an 80 MHz 802.11ac capture.
    ///
    /// Slots are in FFT-shifted order (0..127, then -128..-1). Pilots, nulls,
    /// DC neighbours and the band edges are dropped.
    pub fn nexmon() -> Self {
        const PILOTS: [i32; 6] = [-53, -25, -11, 11, 25, 53];
        const NULLS: [i32; 15] = [0, -1, 1, -59, -60, -61, -62, -63, -64, 59, 60, 61, 62, 63, 64];
        const UNUSED: [i32; 7] = [-3, -2, 2, 3, -126, -127, -128];

        let flags = (0..SUBCARRIER_SLOTS)
            .map(|slot| {
                let index = if slot < SUBCARRIER_SLOTS / 2 {
                    slot as i32
                } else {
                    slot as i32 - SUBCARRIER_SLOTS as i32
                };
                !(PILOTS.contains(&index) || NULLS.contains(&index) || UNUSED.contains(&index))
            })
            .collect();
        Self(flags)
    }

    /// Number of retained subcarriers (popcount of the mask).
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&keep| keep).count()
    }

    /// Total number of slots, retained or not.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn flags(&self) -> &[bool] {
        &self.0
    }

    /// Iterate the values of `row` whose slot is retained.
    pub fn select<'a, T>(&'a self, row: &'a [T]) -> impl Iterator<Item = &'a T> + 'a {
        row.iter()
            .zip(self.0.iter())
            .filter_map(|(value, &keep)| keep.then_some(value))
    }
}

impl Default for SubcarrierMask {
    fn default() -> Self {
        Self::all()
    }
}

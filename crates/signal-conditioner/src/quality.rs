//! Quality Flag Filtering

use serde::{Deserialize, Serialize};

/// Quality bits that mark an epoch as unusable.
///
/// Bit positions follow the archive's quality column. Only the bits set in
/// the configured mask cause a point to be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityFlags(pub u32);

impl QualityFlags {
    pub const ATTITUDE_TWEAK: u32 = 1 << 0;
    pub const SAFE_MODE: u32 = 1 << 1;
    pub const COARSE_POINT: u32 = 1 << 2;
    pub const EARTH_POINT: u32 = 1 << 3;
    pub const ARGABRIGHTENING: u32 = 1 << 4;
    pub const DESATURATION: u32 = 1 << 5;
    pub const MANUAL_EXCLUDE: u32 = 1 << 7;
    pub const IMPULSIVE_OUTLIER: u32 = 1 << 10;
    /// Electronic rolling-band pattern noise
    pub const ROLLING_BAND: u32 = 1 << 17;

    /// Mask applied when nothing is configured
    pub const DEFAULT_MASK: u32 = Self::ATTITUDE_TWEAK
        | Self::SAFE_MODE
        | Self::COARSE_POINT
        | Self::EARTH_POINT
        | Self::ARGABRIGHTENING
        | Self::DESATURATION
        | Self::MANUAL_EXCLUDE
        | Self::IMPULSIVE_OUTLIER
        | Self::ROLLING_BAND;

    /// Whether an epoch with `quality` should be dropped under this mask
    pub fn rejects(&self, quality: u32) -> bool {
        quality & self.0 != 0
    }

    /// Whether an epoch is usable: not flagged and both values finite
    pub fn accepts(&self, time: f64, flux: f64, quality: u32) -> bool {
        time.is_finite() && flux.is_finite() && !self.rejects(quality)
    }
}

impl Default for QualityFlags {
    fn default() -> Self {
        Self(Self::DEFAULT_MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mask_rejects_rolling_band() {
        let flags = QualityFlags::default();
        assert!(flags.rejects(QualityFlags::ROLLING_BAND));
        assert!(flags.rejects(QualityFlags::SAFE_MODE | 1 << 20));
        assert!(!flags.rejects(0));
    }

    #[test]
    fn test_unmasked_bits_are_kept() {
        let flags = QualityFlags(QualityFlags::SAFE_MODE);
        assert!(!flags.rejects(QualityFlags::ROLLING_BAND));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let flags = QualityFlags::default();
        assert!(!flags.accepts(f64::NAN, 1.0, 0));
        assert!(!flags.accepts(1.0, f64::INFINITY, 0));
        assert!(flags.accepts(1.0, 1.0, 0));
    }
}

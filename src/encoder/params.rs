//! Encoding option types shared by the codecs and the registry.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 75). Clamped on construction.
//! - [`CompressionLevel`]: PNG deflate effort (fast / default / best).
//! - [`CompressionTier`]: One `(threshold, quality)` step of the size-adaptive JPEG policy.
//! - [`CompressionTiers`]: The ordered tier table, ascending by threshold.

use serde::{Deserialize, Serialize};

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(pub u8);

impl Quality {
    /// The lossless maximum. A JPEG encoder configured at this quality never
    /// stands in for PNG.
    pub const MAX: Quality = Quality(100);

    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_max(self) -> bool {
        self == Self::MAX
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// PNG compression effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Fast,
    Default,
    #[default]
    Best,
}

impl From<CompressionLevel> for image::codecs::png::CompressionType {
    fn from(level: CompressionLevel) -> Self {
        match level {
            CompressionLevel::Fast => Self::Fast,
            CompressionLevel::Default => Self::Default,
            CompressionLevel::Best => Self::Best,
        }
    }
}

/// A single step of the size-adaptive JPEG policy: inputs whose size hint is
/// at or below `threshold` bytes encode at `quality`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompressionTier {
    pub threshold: u64,
    pub quality: Quality,
}

impl CompressionTier {
    pub const fn new(threshold: u64, quality: u8) -> Self {
        Self {
            threshold,
            quality: Quality(quality),
        }
    }
}

/// Ordered tier table. Always walked from the smallest threshold upward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionTiers(Vec<CompressionTier>);

impl CompressionTiers {
    /// Build a table, sorting by threshold so lookups stay deterministic
    /// whatever order the tiers were declared in.
    pub fn new(mut tiers: Vec<CompressionTier>) -> Self {
        tiers.sort_by_key(|t| t.threshold);
        Self(tiers)
    }

    /// Quality of the first tier whose threshold is not exceeded by
    /// `size_hint`, or `None` when the hint is above every threshold.
    pub fn quality_for(&self, size_hint: u64) -> Option<Quality> {
        self.0
            .iter()
            .find(|tier| size_hint <= tier.threshold)
            .map(|tier| tier.quality)
    }

    pub fn as_slice(&self) -> &[CompressionTier] {
        &self.0
    }
}

impl Default for CompressionTiers {
    fn default() -> Self {
        Self(default_tiers())
    }
}

/// The stock tier table.
pub fn default_tiers() -> Vec<CompressionTier> {
    vec![
        CompressionTier::new(500 * KIB, 75),
        CompressionTier::new(MIB, 75),
        CompressionTier::new(5 * MIB, 75),
        CompressionTier::new(10 * MIB, 75),
        CompressionTier::new(100 * MIB, 75),
        CompressionTier::new(1000 * MIB, 75),
    ]
}

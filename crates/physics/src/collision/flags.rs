//! Content flags for collision filtering.
//!
//! Brushes carry a content set; movement queries only collide with the
//! player-solid mask, fluid checks only with the fluid mask.

use serde::{Deserialize, Serialize};

/// What kind of volume a brush is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContentFlags(pub u32);

impl ContentFlags {
    /// Empty space.
    pub const EMPTY: Self = Self(0);

    /// Solid world geometry.
    pub const SOLID: Self = Self(1 << 0);

    /// Water volume, hands movement over to swimming.
    pub const WATER: Self = Self(1 << 1);

    /// Blocks players but nothing else.
    pub const PLAYER_CLIP: Self = Self(1 << 2);

    /// Non-blocking trigger volume.
    pub const TRIGGER: Self = Self(1 << 3);

    /// Everything that blocks the movement capsule.
    pub const MASK_PLAYER_SOLID: Self = Self(Self::SOLID.0 | Self::PLAYER_CLIP.0);

    /// Everything that counts as fluid.
    pub const MASK_FLUID: Self = Self::WATER;

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }
}

impl std::ops::BitOr for ContentFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

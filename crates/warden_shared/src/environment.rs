//! Environment classification as reported by the world oracle.

use serde::{Deserialize, Serialize};

/// Material class of a single block, as far as movement is concerned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockClass {
    /// Nothing there.
    #[default]
    Air,
    /// Full collision.
    Solid,
    /// Water, lava.
    Liquid,
    /// Ladders, vines.
    Climbable,
    /// Cobweb.
    Web,
    /// Solid block with a movement-altering surface.
    Special(SurfaceKind),
}

impl BlockClass {
    /// Returns true if an entity cannot occupy this block.
    #[must_use]
    pub const fn is_impassable(self) -> bool {
        matches!(self, Self::Solid | Self::Special(_))
    }

    /// Top of the collision box above the block's base, in blocks.
    #[must_use]
    pub const fn collision_height(self) -> f64 {
        match self {
            Self::Solid => 1.0,
            Self::Special(kind) => kind.collision_height(),
            Self::Air | Self::Liquid | Self::Climbable | Self::Web => 0.0,
        }
    }
}

/// Movement-altering surfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    /// Low friction, carries momentum.
    Ice,
    /// Bouncy; cancels fall.
    Slime,
    /// Slows movement.
    SoulSand,
    /// Slows movement.
    Honey,
}

impl SurfaceKind {
    /// Top of the collision box; entities sink into soul sand and honey.
    #[must_use]
    pub const fn collision_height(self) -> f64 {
        match self {
            Self::Ice | Self::Slime => 1.0,
            Self::SoulSand => 0.875,
            Self::Honey => 0.9375,
        }
    }
}

/// Per-tick environment snapshot of the player's own bounding box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentFlags {
    /// Touching any liquid.
    pub in_liquid: bool,
    /// Touching a climbable block.
    pub on_climbable: bool,
    /// Inside cobweb.
    pub in_web: bool,
    /// Standing on (or just left) a special surface.
    pub surface: Option<SurfaceKind>,
}

impl EnvironmentFlags {
    /// Returns true for environments no movement detector models.
    #[must_use]
    pub const fn is_excluded(&self) -> bool {
        self.in_liquid || self.on_climbable || self.in_web
    }
}

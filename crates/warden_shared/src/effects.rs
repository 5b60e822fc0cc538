//! Status effects relevant to movement and combat.
//!
//! Amplifiers are zero-based: `Some(0)` is level I.

use serde::{Deserialize, Serialize};

/// Active status effects snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusEffects {
    /// Speed effect amplifier.
    pub speed: Option<u8>,
    /// Slowness effect amplifier.
    pub slowness: Option<u8>,
    /// Jump boost amplifier.
    pub jump_boost: Option<u8>,
    /// Slow falling active.
    pub slow_falling: bool,
    /// Levitation amplifier.
    pub levitation: Option<u8>,
}

impl StatusEffects {
    /// No effects.
    pub const NONE: Self = Self {
        speed: None,
        slowness: None,
        jump_boost: None,
        slow_falling: false,
        levitation: None,
    };

    /// Speed level (amplifier + 1), zero when absent.
    #[must_use]
    pub fn speed_level(&self) -> u32 {
        self.speed.map_or(0, |a| u32::from(a) + 1)
    }

    /// Slowness level (amplifier + 1), zero when absent.
    #[must_use]
    pub fn slowness_level(&self) -> u32 {
        self.slowness.map_or(0, |a| u32::from(a) + 1)
    }

    /// Jump boost level (amplifier + 1), zero when absent.
    #[must_use]
    pub fn jump_level(&self) -> u32 {
        self.jump_boost.map_or(0, |a| u32::from(a) + 1)
    }
}

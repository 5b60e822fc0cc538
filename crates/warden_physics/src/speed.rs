//! # Horizontal Speed Limits
//!
//! The maximum legal horizontal displacement per tick is composed
//! multiplicatively, in a fixed order:
//!
//! ```text
//! base (walk | sprint)
//!   × air-state adjustment
//!   × surface
//!   × lingering surface momentum
//!   × status effects (speed, slowness)
//!   × safety margin
//!   min hard cap
//! ```
//!
//! Order matters only for the final cap; every other stage is a product.

use serde::{Deserialize, Serialize};
use warden_shared::{StatusEffects, SurfaceKind};

/// Surface inputs to the speed model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceModifiers {
    /// Surface currently underfoot.
    pub surface: Option<SurfaceKind>,
    /// Ticks of low-friction momentum remaining after leaving ice.
    pub lingering_ticks: u32,
}

impl SurfaceModifiers {
    /// Plain ground, no momentum.
    pub const NONE: Self = Self {
        surface: None,
        lingering_ticks: 0,
    };
}

/// Tunable horizontal speed model. Speeds are blocks per tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedModel {
    /// Walking speed.
    pub walk_speed: f64,
    /// Sprinting speed.
    pub sprint_speed: f64,
    /// Multiplier while airborne (jump boost of sprint-jumping).
    pub air_multiplier: f64,
    /// Multiplier on ice.
    pub ice_multiplier: f64,
    /// Multiplier on slime.
    pub slime_multiplier: f64,
    /// Multiplier on soul sand and honey.
    pub sticky_multiplier: f64,
    /// Ticks over which ice momentum fades out.
    pub lingering_max_ticks: u32,
    /// Speed gained per speed level.
    pub speed_per_level: f64,
    /// Speed lost per slowness level.
    pub slowness_per_level: f64,
    /// Fixed safety margin multiplier.
    pub safety_margin: f64,
    /// Absolute ceiling, whatever the modifiers say.
    pub hard_cap: f64,
}

impl Default for SpeedModel {
    fn default() -> Self {
        Self {
            walk_speed: 0.216,
            sprint_speed: 0.281,
            air_multiplier: 1.3,
            ice_multiplier: 2.6,
            slime_multiplier: 0.8,
            sticky_multiplier: 0.55,
            lingering_max_ticks: 20,
            speed_per_level: 0.2,
            slowness_per_level: 0.15,
            safety_margin: 1.08,
            hard_cap: 1.5,
        }
    }
}

impl SpeedModel {
    /// Maximum legal horizontal displacement for one tick.
    #[must_use]
    pub fn max_horizontal_speed(
        &self,
        sprinting: bool,
        surface: SurfaceModifiers,
        status: &StatusEffects,
        airborne: bool,
    ) -> f64 {
        let mut speed = if sprinting {
            self.sprint_speed
        } else {
            self.walk_speed
        };

        if airborne {
            speed *= self.air_multiplier;
        }

        speed *= self.surface_multiplier(surface.surface);

        if surface.surface != Some(SurfaceKind::Ice) {
            speed *= self.lingering_multiplier(surface.lingering_ticks);
        }

        speed *= 1.0 + self.speed_per_level * f64::from(status.speed_level());
        speed *= (1.0 - self.slowness_per_level * f64::from(status.slowness_level())).max(0.0);

        speed *= self.safety_margin;

        speed.min(self.hard_cap)
    }

    fn surface_multiplier(&self, surface: Option<SurfaceKind>) -> f64 {
        match surface {
            None => 1.0,
            Some(SurfaceKind::Ice) => self.ice_multiplier,
            Some(SurfaceKind::Slime) => self.slime_multiplier,
            Some(SurfaceKind::SoulSand | SurfaceKind::Honey) => self.sticky_multiplier,
        }
    }

    /// Linear fade from the ice multiplier back to 1.0.
    fn lingering_multiplier(&self, lingering_ticks: u32) -> f64 {
        if lingering_ticks == 0 || self.lingering_max_ticks == 0 {
            return 1.0;
        }
        let fraction = f64::from(lingering_ticks.min(self.lingering_max_ticks))
            / f64::from(self.lingering_max_ticks);
        1.0 + (self.ice_multiplier - 1.0).max(0.0) * fraction
    }
}

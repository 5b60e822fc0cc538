//! # Vertical Motion Model
//!
//! Per-tick integration used by clients: subtract gravity, then apply air
//! drag, then clamp to terminal velocity.
//!
//! ```text
//! v(n+1) = max((v(n) - g) * drag, -terminal)
//! ```
//!
//! Units are blocks and blocks per tick.

use serde::{Deserialize, Serialize};

/// Gravity acceleration (blocks per tick squared).
pub const GRAVITY: f64 = 0.08;

/// Vertical drag multiplier applied every airborne tick.
pub const DRAG: f64 = 0.98;

/// Reduced gravity while slow falling.
pub const SLOW_FALLING_GRAVITY: f64 = 0.01;

/// Terminal fall velocity (blocks per tick).
pub const TERMINAL_VELOCITY: f64 = 3.92;

/// Vertical velocity of a plain jump.
pub const JUMP_VELOCITY: f64 = 0.42;

/// Extra jump velocity per jump boost level.
pub const JUMP_BOOST_PER_LEVEL: f64 = 0.1;

/// Tunable vertical motion model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GravityModel {
    /// Gravity acceleration.
    pub gravity: f64,
    /// Drag multiplier.
    pub drag: f64,
    /// Gravity while slow falling and descending.
    pub slow_falling_gravity: f64,
    /// Terminal velocity magnitude.
    pub terminal_velocity: f64,
    /// Plain jump velocity.
    pub jump_velocity: f64,
    /// Jump velocity added per jump boost level.
    pub jump_boost_per_level: f64,
}

impl Default for GravityModel {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            drag: DRAG,
            slow_falling_gravity: SLOW_FALLING_GRAVITY,
            terminal_velocity: TERMINAL_VELOCITY,
            jump_velocity: JUMP_VELOCITY,
            jump_boost_per_level: JUMP_BOOST_PER_LEVEL,
        }
    }
}

impl GravityModel {
    /// Predicts the vertical displacement of the next tick.
    ///
    /// `last_velocity` is the previous tick's vertical delta. A grounded
    /// player carries no vertical momentum, so the prediction starts from
    /// rest.
    #[must_use]
    pub fn predict_next_vertical_position(
        &self,
        last_velocity: f64,
        on_ground: bool,
        slow_falling: bool,
    ) -> f64 {
        let base = if on_ground { 0.0 } else { last_velocity };
        let gravity = if slow_falling && base <= 0.0 {
            self.slow_falling_gravity
        } else {
            self.gravity
        };
        ((base - gravity) * self.drag).max(-self.terminal_velocity)
    }

    /// Initial vertical velocity of a jump at the given jump boost level.
    #[must_use]
    pub fn jump_velocity(&self, jump_level: u32) -> f64 {
        self.jump_velocity + self.jump_boost_per_level * f64::from(jump_level)
    }

    /// Simulates `ticks` airborne ticks starting from `initial_velocity`.
    ///
    /// Returns cumulative height offsets, one per tick, relative to the
    /// starting height. The first entry is `initial_velocity` itself.
    #[must_use]
    pub fn simulate_fall(&self, initial_velocity: f64, ticks: usize, slow_falling: bool) -> Vec<f64> {
        let mut offsets = Vec::with_capacity(ticks);
        let mut velocity = initial_velocity;
        let mut height = 0.0;
        for _ in 0..ticks {
            height += velocity;
            offsets.push(height);
            velocity = self.predict_next_vertical_position(velocity, false, slow_falling);
        }
        offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tick_after_leaving_ground() {
        let model = GravityModel::default();
        let next = model.predict_next_vertical_position(0.0, true, false);
        assert!((next - (-0.0784)).abs() < 1e-9);
    }

    #[test]
    fn test_ground_discards_momentum() {
        let model = GravityModel::default();
        let a = model.predict_next_vertical_position(5.0, true, false);
        let b = model.predict_next_vertical_position(-2.0, true, false);
        assert_eq!(a, b);
    }

    #[test]
    fn test_terminal_velocity_clamp() {
        let model = GravityModel::default();
        let mut v = 0.0;
        for _ in 0..500 {
            v = model.predict_next_vertical_position(v, false, false);
            assert!(v >= -model.terminal_velocity - 1e-12);
        }
        assert!((v + model.terminal_velocity).abs() < 1e-3);

        let clamped = model.predict_next_vertical_position(-10.0, false, false);
        assert_eq!(clamped, -model.terminal_velocity);
    }

    #[test]
    fn test_slow_falling_only_when_descending() {
        let model = GravityModel::default();
        let rising = model.predict_next_vertical_position(0.3, false, true);
        assert!((rising - (0.3 - GRAVITY) * DRAG).abs() < 1e-12);

        let falling = model.predict_next_vertical_position(-0.1, false, true);
        assert!((falling - (-0.1 - SLOW_FALLING_GRAVITY) * DRAG).abs() < 1e-12);
    }

    #[test]
    fn test_jump_boost() {
        let model = GravityModel::default();
        assert!((model.jump_velocity(0) - 0.42).abs() < 1e-12);
        assert!((model.jump_velocity(2) - 0.62).abs() < 1e-12);
    }

    #[test]
    fn test_simulated_jump_returns_near_start() {
        let model = GravityModel::default();
        let offsets = model.simulate_fall(0.42, 12, false);
        assert_eq!(offsets.len(), 12);
        // Peak of a vanilla jump is ~1.25 blocks.
        let peak = offsets.iter().copied().fold(f64::MIN, f64::max);
        assert!(peak > 1.2 && peak < 1.3, "peak {peak}");
    }
}

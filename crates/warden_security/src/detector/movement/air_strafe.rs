//! # Air Strafe Detector
//!
//! Airborne players keep their momentum: each tick, horizontal motion is
//! the previous motion times air friction plus a small input acceleration.
//! The largest direction change that acceleration can produce is
//!
//! ```text
//! max_angle = atan(accel / (friction * |v_prev|))
//! ```
//!
//! Turning harder than that, in step with camera rotation, is air control
//! no legitimate client has.

use serde::{Deserialize, Serialize};
use warden_physics::{angle_between, yaw_delta};

use super::{grounded, should_stand_down};
use crate::detector::components::{Debounce, DebounceConfig};
use crate::detector::{Detector, DetectorContext, DetectorId, Finding};
use crate::error::DetectorError;
use crate::violation::DetectorSettings;

/// Air strafe detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirStrafeConfig {
    /// Accumulation settings.
    #[serde(flatten)]
    pub settings: DetectorSettings,
    /// Escalation settings.
    pub debounce: DebounceConfig,
    /// Previous horizontal speed below which direction is meaningless.
    pub min_speed: f64,
    /// Input acceleration while airborne, blocks per tick².
    pub air_acceleration: f64,
    /// Horizontal momentum kept per airborne tick.
    pub air_friction: f64,
    /// Degrees added to the allowed angle.
    pub angle_margin: f64,
    /// Camera rotation required to correlate a turn with input.
    pub min_yaw_change: f64,
    /// Arrival gap below which the tick is part of a packet burst.
    pub burst_interval_ms: u64,
}

impl Default for AirStrafeConfig {
    fn default() -> Self {
        Self {
            settings: DetectorSettings::default(),
            debounce: DebounceConfig::new(3, 4.0),
            min_speed: 0.1,
            air_acceleration: 0.026,
            air_friction: 0.91,
            angle_margin: 4.0,
            min_yaw_change: 2.0,
            burst_interval_ms: 10,
        }
    }
}

/// Mid-air direction changes.
#[derive(Debug)]
pub struct AirStrafeDetector {
    config: AirStrafeConfig,
    debounce: Debounce,
}

impl AirStrafeDetector {
    /// Creates the detector.
    #[must_use]
    pub fn new(config: &AirStrafeConfig) -> Self {
        Self {
            config: config.clone(),
            debounce: Debounce::new(config.debounce),
        }
    }
}

impl Detector for AirStrafeDetector {
    fn id(&self) -> DetectorId {
        DetectorId::AirStrafe
    }

    fn observe(&mut self, ctx: &DetectorContext<'_>) -> Result<Option<Finding>, DetectorError> {
        let obs = ctx.obs();
        if !obs.kind.has_position() {
            return Ok(None);
        }
        ctx.require_finite_motion()?;
        if should_stand_down(ctx) {
            self.reset();
            return Ok(None);
        }

        // Take-off tick carries the jump impulse; only judge mid-air ticks.
        let airborne = !grounded(obs.client_on_ground, obs.server_on_ground);
        let was_airborne = !grounded(
            ctx.motion.last_client_on_ground,
            ctx.motion.last_server_on_ground,
        );
        if !airborne || !was_airborne {
            self.debounce.clean();
            return Ok(None);
        }
        if ctx.motion.in_burst(self.config.burst_interval_ms) {
            return Ok(None);
        }

        let previous = ctx.motion.last_delta.horizontal();
        let current = obs.delta.horizontal();
        let prev_speed = previous.length();
        if prev_speed < self.config.min_speed {
            self.debounce.clean();
            return Ok(None);
        }

        let speed_bonus = 1.0 + 0.2 * f64::from(obs.effects.speed_level());
        let accel = self.config.air_acceleration * speed_bonus * ctx.tolerance.scale();
        let allowed = (accel / (self.config.air_friction * prev_speed))
            .atan()
            .to_degrees()
            + self.config.angle_margin;
        let angle = angle_between(previous, current);
        let turned = yaw_delta(ctx.motion.last_yaw, obs.yaw);

        if angle <= allowed || turned < self.config.min_yaw_change {
            self.debounce.clean();
            return Ok(None);
        }
        let Some(buffer) = self.debounce.exceed() else {
            return Ok(None);
        };
        Ok(Some(ctx.finding(
            DetectorId::AirStrafe,
            self.config.settings.weight,
            format!(
                "turned {angle:.1}° mid-air (allowed {allowed:.1}°) with yaw change {turned:.1}° buffer={buffer:.1}"
            ),
        )))
    }

    fn reset(&mut self) {
        self.debounce.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::testing::Harness;
    use crate::observation::Observation;
    use warden_shared::Vec3;

    /// Feeds airborne ticks with the given horizontal deltas and yaws.
    fn fly(steps: &[(f64, f64, f64)]) -> usize {
        let mut harness = Harness::new();
        let mut detector = AirStrafeDetector::new(&AirStrafeConfig::default());
        let mut pos = Vec3::new(0.0, 80.0, 0.0);
        let mut findings = 0;
        for (i, &(dx, dz, yaw)) in steps.iter().enumerate() {
            let seq = i as u64 + 1;
            let next = Vec3::new(pos.x + dx, pos.y, pos.z + dz);
            let obs = Observation::builder(seq, seq * 50)
                .moved(pos, next)
                .on_ground(false)
                .rotation(yaw, 0.0)
                .build();
            pos = next;
            if harness.feed(&mut detector, obs).is_some() {
                findings += 1;
            }
        }
        findings
    }

    #[test]
    fn test_momentum_flight_is_clean() {
        let mut steps = Vec::new();
        let mut v = 0.3;
        for i in 0..20 {
            steps.push((0.0, v, f64::from(i) * 3.0));
            v *= 0.91;
            v += 0.01;
        }
        assert_eq!(fly(&steps), 0);
    }

    #[test]
    fn test_sharp_air_turns_flag() {
        // Zig-zag 90° every tick while spinning the camera.
        let steps: Vec<(f64, f64, f64)> = (0..20)
            .map(|i| {
                if i % 2 == 0 {
                    (0.3, 0.0, f64::from(i) * 45.0)
                } else {
                    (0.0, 0.3, f64::from(i) * 45.0)
                }
            })
            .collect();
        assert!(fly(&steps) > 0);
    }

    #[test]
    fn test_turn_without_camera_motion_ignored() {
        let steps: Vec<(f64, f64, f64)> = (0..20)
            .map(|i| if i % 2 == 0 { (0.3, 0.0, 0.0) } else { (0.0, 0.3, 0.0) })
            .collect();
        assert_eq!(fly(&steps), 0);
    }
}

//! # Keep-Sprint Detector
//!
//! Sprinting requires forward input. Forward plus sideways input gives at
//! most a 45° offset between facing and motion, so a sustained sprint whose
//! motion points well away from the camera is omnidirectional sprint.

use serde::{Deserialize, Serialize};
use warden_physics::{angle_between, yaw_to_direction};

use super::{grounded, should_stand_down};
use crate::detector::components::{Debounce, DebounceConfig};
use crate::detector::{Detector, DetectorContext, DetectorId, Finding};
use crate::error::DetectorError;
use crate::exemption::ExemptionReason;
use crate::violation::DetectorSettings;

/// Keep-sprint detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepSprintConfig {
    /// Accumulation settings.
    #[serde(flatten)]
    pub settings: DetectorSettings,
    /// Escalation settings.
    pub debounce: DebounceConfig,
    /// Horizontal speed below which direction is ignored.
    pub min_speed: f64,
    /// Largest legitimate angle between facing and motion, degrees.
    pub max_offset: f64,
}

impl Default for KeepSprintConfig {
    fn default() -> Self {
        Self {
            settings: DetectorSettings::default(),
            debounce: DebounceConfig::new(4, 6.0),
            min_speed: 0.15,
            max_offset: 60.0,
        }
    }
}

/// Sprinting away from the facing direction.
#[derive(Debug)]
pub struct KeepSprintDetector {
    config: KeepSprintConfig,
    debounce: Debounce,
}

impl KeepSprintDetector {
    /// Creates the detector.
    #[must_use]
    pub fn new(config: &KeepSprintConfig) -> Self {
        Self {
            config: config.clone(),
            debounce: Debounce::new(config.debounce),
        }
    }
}

impl Detector for KeepSprintDetector {
    fn id(&self) -> DetectorId {
        DetectorId::KeepSprint
    }

    fn observe(&mut self, ctx: &DetectorContext<'_>) -> Result<Option<Finding>, DetectorError> {
        let obs = ctx.obs();
        if !obs.kind.has_position() {
            return Ok(None);
        }
        ctx.require_finite_motion()?;
        if should_stand_down(ctx) || ctx.is_exempt_for(&[ExemptionReason::Velocity]) {
            self.reset();
            return Ok(None);
        }

        // Air momentum legitimately outlives a camera turn.
        let on_ground = grounded(obs.client_on_ground, obs.server_on_ground)
            && ctx.motion.last_client_on_ground;
        let sprinting = obs.sprinting && ctx.motion.last_sprinting;
        let motion = obs.delta.horizontal();
        if !on_ground || !sprinting || motion.length() < self.config.min_speed {
            self.debounce.clean();
            return Ok(None);
        }

        let offset = angle_between(yaw_to_direction(obs.yaw), motion);
        let allowed = (self.config.max_offset * ctx.tolerance.scale()).min(180.0);
        if offset <= allowed {
            self.debounce.clean();
            return Ok(None);
        }
        let Some(buffer) = self.debounce.exceed() else {
            return Ok(None);
        };
        Ok(Some(ctx.finding(
            DetectorId::KeepSprint,
            self.config.settings.weight,
            format!(
                "sprinting {offset:.1}° off facing (allowed {allowed:.1}°) buffer={buffer:.1}"
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

    fn sprint(yaw: f64, dir: (f64, f64), ticks: u64) -> usize {
        let mut harness = Harness::new();
        let mut detector = KeepSprintDetector::new(&KeepSprintConfig::default());
        let mut pos = Vec3::new(0.5, 64.0, 0.5);
        let mut findings = 0;
        for seq in 1..=ticks {
            let next = Vec3::new(pos.x + dir.0 * 0.28, 64.0, pos.z + dir.1 * 0.28);
            let obs = Observation::builder(seq, seq * 50)
                .moved(pos, next)
                .rotation(yaw, 0.0)
                .sprinting(true)
                .build();
            pos = next;
            if harness.feed(&mut detector, obs).is_some() {
                findings += 1;
            }
        }
        findings
    }

    #[test]
    fn test_forward_sprint_is_clean() {
        // Yaw 0 faces +Z.
        assert_eq!(sprint(0.0, (0.0, 1.0), 40), 0);
        // Forward-diagonal input.
        let d = std::f64::consts::FRAC_1_SQRT_2;
        assert_eq!(sprint(0.0, (d, d), 40), 0);
    }

    #[test]
    fn test_backwards_sprint_flags() {
        assert!(sprint(0.0, (0.0, -1.0), 40) > 0);
    }
}

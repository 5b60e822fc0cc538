//! # Sprint Hit Detector
//!
//! Landing a hit while sprinting multiplies horizontal motion by a penalty
//! and ends the sprint. The tick after a sprint attack must therefore be
//! clearly slower than the tick before it:
//!
//! ```text
//! post <= pre * penalty_ratio + accel_allowance
//! ```
//!
//! A client that skips the penalty either keeps accelerating past that bound
//! or holds its speed unnaturally constant.

use serde::{Deserialize, Serialize};

use crate::detector::components::{Debounce, DebounceConfig};
use crate::detector::{Detector, DetectorContext, DetectorId, Finding};
use crate::error::DetectorError;
use crate::observation::ObservationKind;
use crate::violation::DetectorSettings;

/// Sprint hit detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SprintHitConfig {
    /// Accumulation settings.
    #[serde(flatten)]
    pub settings: DetectorSettings,
    /// Escalation settings.
    pub debounce: DebounceConfig,
    /// Motion kept after a sprint hit.
    pub penalty_ratio: f64,
    /// Acceleration a client may regain in one tick.
    pub accel_allowance: f64,
    /// Post/pre ratio band around 1.0 that counts as unchanged.
    pub constant_band: f64,
    /// Pre-attack speed below which the penalty is unmeasurable.
    pub min_pre_speed: f64,
}

impl Default for SprintHitConfig {
    fn default() -> Self {
        Self {
            settings: DetectorSettings::default(),
            debounce: DebounceConfig::new(2, 3.0),
            penalty_ratio: 0.6,
            accel_allowance: 0.13,
            constant_band: 0.02,
            min_pre_speed: 0.2,
        }
    }
}

/// Missing sprint-attack slowdown.
#[derive(Debug)]
pub struct SprintHitDetector {
    config: SprintHitConfig,
    /// Horizontal speed before the latest unjudged sprint attack.
    pending: Option<f64>,
    debounce: Debounce,
}

impl SprintHitDetector {
    /// Creates the detector.
    #[must_use]
    pub fn new(config: &SprintHitConfig) -> Self {
        Self {
            config: config.clone(),
            pending: None,
            debounce: Debounce::new(config.debounce),
        }
    }
}

impl Detector for SprintHitDetector {
    fn id(&self) -> DetectorId {
        DetectorId::SprintHit
    }

    fn observe(&mut self, ctx: &DetectorContext<'_>) -> Result<Option<Finding>, DetectorError> {
        let obs = ctx.obs();
        // Knockback and damage both rewrite motion across the hit.
        if ctx.is_exempt() {
            self.reset();
            return Ok(None);
        }

        if matches!(obs.kind, ObservationKind::Attack { .. }) {
            let pre = ctx.motion.last_delta.horizontal_length();
            let sprinting = obs.sprinting || ctx.motion.last_sprinting;
            self.pending = (sprinting && pre >= self.config.min_pre_speed).then_some(pre);
            return Ok(None);
        }
        if !obs.kind.has_position() {
            return Ok(None);
        }
        let Some(pre) = self.pending.take() else {
            return Ok(None);
        };
        ctx.require_finite_motion()?;

        let post = obs.delta.horizontal_length();
        let bound = pre * self.config.penalty_ratio + ctx.tolerance.apply(self.config.accel_allowance);
        let ratio = post / pre;
        let verdict = if post > bound {
            Some(format!("speed {post:.3} after hit exceeds {bound:.3}"))
        } else if (ratio - 1.0).abs() < self.config.constant_band {
            Some(format!("speed unchanged across hit (ratio {ratio:.3})"))
        } else {
            None
        };

        let Some(evidence) = verdict else {
            self.debounce.clean();
            return Ok(None);
        };
        let Some(buffer) = self.debounce.exceed() else {
            return Ok(None);
        };
        Ok(Some(ctx.finding(
            DetectorId::SprintHit,
            self.config.settings.weight,
            format!("{evidence} pre={pre:.3} buffer={buffer:.1}"),
        )))
    }

    fn reset(&mut self) {
        self.pending = None;
        self.debounce.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::testing::Harness;
    use crate::observation::Observation;
    use warden_shared::Vec3;

    /// Sprints at 0.28 b/t, attacks, then moves `post` on the next tick.
    fn hit_and_run(post: f64, rounds: u64) -> usize {
        let mut harness = Harness::new();
        let mut detector = SprintHitDetector::new(&SprintHitConfig::default());
        let mut pos = Vec3::new(0.5, 64.0, 0.5);
        let mut seq = 0;
        let mut t = 10_000;
        let mut findings = 0;
        for _ in 0..rounds {
            for (i, speed) in [0.28, 0.28, post].into_iter().enumerate() {
                if i == 2 {
                    seq += 1;
                    let attack = Observation::builder(seq, t)
                        .kind(ObservationKind::Attack { target: 5 })
                        .sprinting(true)
                        .build();
                    findings += usize::from(harness.feed(&mut detector, attack).is_some());
                }
                seq += 1;
                t += 50;
                let next = Vec3::new(pos.x, pos.y, pos.z + speed);
                let obs = Observation::builder(seq, t).moved(pos, next).sprinting(true).build();
                pos = next;
                findings += usize::from(harness.feed(&mut detector, obs).is_some());
            }
        }
        findings
    }

    #[test]
    fn test_penalised_hit_is_clean() {
        // 0.28 * 0.6 after friction plus walking acceleration.
        assert_eq!(hit_and_run(0.19, 10), 0);
    }

    #[test]
    fn test_kept_speed_flags() {
        assert!(hit_and_run(0.28, 10) > 0);
    }

    #[test]
    fn test_accelerating_through_hit_flags() {
        assert!(hit_and_run(0.35, 10) > 0);
    }
}

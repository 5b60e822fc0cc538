//! # Speed Detector
//!
//! Horizontal displacement divided by the legal maximum for the tick gives a
//! ratio; the detector judges the average over a window rather than single
//! ticks. Two patterns escalate:
//!
//! - **sustained excess**: window average above 1.0
//! - **just under the limit**: average hugging the limit with machine
//!   regularity, the signature of a speed hack tuned to stay unflagged

use serde::{Deserialize, Serialize};
use warden_physics::stats::{mean, regularity_score};
use warden_physics::SurfaceModifiers;
use warden_shared::SurfaceKind;

use super::{grounded, should_stand_down};
use crate::detector::components::{Debounce, DebounceConfig, SampleWindow};
use crate::detector::{Detector, DetectorContext, DetectorId, Finding};
use crate::error::{ConfigError, ConfigResult, DetectorError};
use crate::violation::DetectorSettings;

/// Speed detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    /// Accumulation settings.
    #[serde(flatten)]
    pub settings: DetectorSettings,
    /// Escalation settings.
    pub debounce: DebounceConfig,
    /// Ratios kept.
    pub window: usize,
    /// Ratios required before judging.
    pub min_samples: usize,
    /// Average ratio above which movement is too fast.
    pub excess_ratio: f64,
    /// Average ratio above which regularity is examined.
    pub near_limit_ratio: f64,
    /// Regularity at or above which near-limit motion is suspicious.
    pub near_limit_regularity: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            settings: DetectorSettings::default(),
            debounce: DebounceConfig::new(3, 4.0),
            window: 20,
            min_samples: 10,
            excess_ratio: 1.0,
            near_limit_ratio: 0.97,
            near_limit_regularity: 0.9,
        }
    }
}

impl SpeedConfig {
    pub(crate) fn validate(&self) -> ConfigResult<()> {
        self.debounce.validate()?;
        if self.min_samples == 0 || self.min_samples > self.window {
            return Err(ConfigError::out_of_range(
                "min_samples",
                format!("must be in 1..={}, got {}", self.window, self.min_samples),
            ));
        }
        if !(self.near_limit_ratio > 0.0 && self.near_limit_ratio <= self.excess_ratio) {
            return Err(ConfigError::out_of_range(
                "near_limit_ratio",
                format!("must be in (0, excess_ratio], got {}", self.near_limit_ratio),
            ));
        }
        Ok(())
    }
}

/// Horizontal displacement vs. legal maximum.
#[derive(Debug)]
pub struct SpeedDetector {
    config: SpeedConfig,
    ratios: SampleWindow<f64>,
    debounce: Debounce,
    ice_ticks: u32,
}

impl SpeedDetector {
    /// Creates the detector.
    #[must_use]
    pub fn new(config: &SpeedConfig) -> Self {
        Self {
            config: config.clone(),
            ratios: SampleWindow::new(config.window),
            debounce: Debounce::new(config.debounce),
            ice_ticks: 0,
        }
    }
}

impl Detector for SpeedDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Speed
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
        if ctx.motion.movement_ticks == 0 {
            return Ok(None);
        }

        let model = &ctx.physics.speed;
        let surface = obs.environment.surface;
        if surface == Some(SurfaceKind::Ice) {
            self.ice_ticks = model.lingering_max_ticks;
        } else {
            self.ice_ticks = self.ice_ticks.saturating_sub(1);
        }

        let airborne = !grounded(obs.client_on_ground, obs.server_on_ground)
            || !ctx.motion.last_client_on_ground;
        let sprinting = obs.sprinting || ctx.motion.last_sprinting;
        let allowed = model.max_horizontal_speed(
            sprinting,
            SurfaceModifiers {
                surface,
                lingering_ticks: self.ice_ticks,
            },
            &obs.effects,
            airborne,
        );
        let allowed = ctx.tolerance.apply(allowed);
        let horizontal = obs.delta.horizontal_length();
        let ratio = if allowed > 0.0 {
            horizontal / allowed
        } else if horizontal > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        self.ratios.push(ratio.min(100.0));

        if self.ratios.len() < self.config.min_samples {
            return Ok(None);
        }

        let ratios = self.ratios.to_vec();
        let average = mean(&ratios);
        let regularity = regularity_score(&ratios);
        let verdict = if average > self.config.excess_ratio {
            Some("sustained excess")
        } else if average >= self.config.near_limit_ratio
            && regularity >= self.config.near_limit_regularity
        {
            Some("just under limit")
        } else {
            None
        };

        let Some(label) = verdict else {
            self.debounce.clean();
            return Ok(None);
        };
        let Some(buffer) = self.debounce.exceed() else {
            return Ok(None);
        };

        Ok(Some(ctx.finding(
            DetectorId::Speed,
            self.config.settings.weight,
            format!(
                "{label}: avg_ratio={average:.3} regularity={regularity:.3} speed={horizontal:.4} allowed={allowed:.4} buffer={buffer:.1}"
            ),
        )))
    }

    fn reset(&mut self) {
        self.ratios.clear();
        self.debounce.reset();
        self.ice_ticks = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::testing::Harness;
    use crate::observation::{Observation, ObservationKind};
    use warden_shared::{EnvironmentFlags, Vec3};

    fn walk(detector: &mut SpeedDetector, harness: &mut Harness, step: f64, ticks: u64) -> usize {
        let mut x = 0.0;
        let mut findings = 0;
        for seq in 1..=ticks {
            let from = Vec3::new(x, 64.0, 0.0);
            x += step;
            let obs = Observation::builder(seq, seq * 50)
                .moved(from, Vec3::new(x, 64.0, 0.0))
                .sprinting(true)
                .build();
            if harness.feed(detector, obs).is_some() {
                findings += 1;
            }
        }
        findings
    }

    #[test]
    fn test_legal_sprint_is_clean() {
        let mut harness = Harness::new();
        let mut detector = SpeedDetector::new(&SpeedConfig::default());
        assert_eq!(walk(&mut detector, &mut harness, 0.28, 100), 0);
    }

    #[test]
    fn test_double_speed_flags() {
        let mut harness = Harness::new();
        let mut detector = SpeedDetector::new(&SpeedConfig::default());
        assert!(walk(&mut detector, &mut harness, 0.6, 40) > 0);
    }

    #[test]
    fn test_just_under_limit_flags() {
        let mut harness = Harness::new();
        let mut detector = SpeedDetector::new(&SpeedConfig::default());
        // 99% of the sprint limit, perfectly steady.
        let limit = 0.281 * 1.08;
        assert!(walk(&mut detector, &mut harness, limit * 0.99, 40) > 0);
    }

    #[test]
    fn test_position_less_packets_leave_window_alone() {
        let mut harness = Harness::new();
        let mut detector = SpeedDetector::new(&SpeedConfig::default());
        walk(&mut detector, &mut harness, 0.28, 10);
        let before = detector.ratios.len();
        for (seq, kind) in [(11, ObservationKind::Flying), (12, ObservationKind::Rotation)] {
            let obs = Observation::builder(seq, seq * 50).kind(kind).sprinting(true).build();
            assert!(harness.feed(&mut detector, obs).is_none());
        }
        assert_eq!(detector.ratios.len(), before);
    }

    #[test]
    fn test_liquid_resets_window() {
        let mut harness = Harness::new();
        let mut detector = SpeedDetector::new(&SpeedConfig::default());
        walk(&mut detector, &mut harness, 0.6, 12);
        assert!(!detector.ratios.is_empty());
        let swim = Observation::builder(100, 5_000)
            .at(Vec3::new(0.0, 64.0, 0.0))
            .environment(EnvironmentFlags {
                in_liquid: true,
                ..EnvironmentFlags::default()
            })
            .build();
        harness.feed(&mut detector, swim);
        assert!(detector.ratios.is_empty());
    }
}

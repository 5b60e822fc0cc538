//! # Phase Detector
//!
//! Walks the straight segment between two consecutive positions at fixed
//! spatial steps and probes the body at a few heights. Any probe inside
//! impassable geometry means the client moved through a wall.
//!
//! The engine records the last position that passed this check as the
//! player's safe position; findings cite it for setback.

use serde::{Deserialize, Serialize};
use warden_physics::sample_path;
use warden_shared::{BlockPos, Vec3};

use super::should_stand_down;
use crate::detector::components::{Debounce, DebounceConfig};
use crate::detector::{Detector, DetectorContext, DetectorId, Finding};
use crate::error::{ConfigError, ConfigResult, DetectorError};
use crate::violation::DetectorSettings;

/// Phase detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    /// Accumulation settings.
    #[serde(flatten)]
    pub settings: DetectorSettings,
    /// Escalation settings.
    pub debounce: DebounceConfig,
    /// Spacing between path samples, blocks.
    pub step: f64,
    /// Heights above the feet probed at each sample.
    pub probe_heights: Vec<f64>,
    /// Upper bound on samples per segment.
    pub max_samples: usize,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            settings: DetectorSettings::with_max(5.0),
            debounce: DebounceConfig::new(2, 2.0),
            step: 0.25,
            probe_heights: vec![0.1, 0.9, 1.6],
            max_samples: 128,
        }
    }
}

impl PhaseConfig {
    pub(crate) fn validate(&self) -> ConfigResult<()> {
        self.debounce.validate()?;
        if !(self.step > 0.0) {
            return Err(ConfigError::out_of_range("step", format!("must be positive, got {}", self.step)));
        }
        if self.probe_heights.is_empty() {
            return Err(ConfigError::out_of_range("probe_heights", "must not be empty"));
        }
        if self.max_samples < 2 {
            return Err(ConfigError::out_of_range("max_samples", "must be at least 2"));
        }
        Ok(())
    }
}

/// Movement through solid geometry.
#[derive(Debug)]
pub struct PhaseDetector {
    config: PhaseConfig,
    debounce: Debounce,
}

impl PhaseDetector {
    /// Creates the detector.
    #[must_use]
    pub fn new(config: &PhaseConfig) -> Self {
        Self {
            config: config.clone(),
            debounce: Debounce::new(config.debounce),
        }
    }

    /// First probe along `from → to` that lands inside a solid block.
    fn first_collision(&self, ctx: &DetectorContext<'_>, from: Vec3, to: Vec3) -> Option<Vec3> {
        let distance = from.distance(to);
        let step = self
            .config
            .step
            .max(distance / self.config.max_samples as f64);
        // The starting point was already judged on the previous tick.
        sample_path(from, to, step)
            .into_iter()
            .skip(1)
            .flat_map(|p| {
                self.config
                    .probe_heights
                    .iter()
                    .map(move |h| Vec3::new(p.x, p.y + h, p.z))
            })
            .find(|probe| !ctx.environment.is_passable(*probe))
    }
}

impl Detector for PhaseDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Phase
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
        let Some(from) = ctx.motion.last_position else {
            return Ok(None);
        };
        if from.distance(obs.position) < 1e-4 {
            self.debounce.clean();
            return Ok(None);
        }

        let Some(probe) = self.first_collision(ctx, from, obs.position) else {
            self.debounce.clean();
            return Ok(None);
        };
        let Some(buffer) = self.debounce.exceed() else {
            return Ok(None);
        };

        let block = BlockPos::containing(probe);
        let setback = ctx
            .motion
            .last_safe_position
            .map_or_else(|| "unknown".to_owned(), |p| format!("({:.2}, {:.2}, {:.2})", p.x, p.y, p.z));
        Ok(Some(ctx.finding(
            DetectorId::Phase,
            self.config.settings.weight,
            format!(
                "moved through {:?} at ({}, {}, {}) setback={setback} buffer={buffer:.1}",
                ctx.environment.classify_block_at(block),
                block.x,
                block.y,
                block.z
            ),
        )))
    }

    fn reset(&mut self) {
        self.debounce.reset();
    }
}

//! # Trajectory Detector
//!
//! Looks at the *shape* of an airborne height curve rather than single
//! ticks. Over a window of airborne samples:
//!
//! - **parabola mismatch**: the fitted curvature differs from the curvature
//!   of the gravity model's own fall from the same initial velocity
//! - **constant step**: vertical deltas nearly identical tick after tick
//!   (fly hacks moving at a fixed rate) while disagreeing with gravity
//! - **oscillation**: vertical deltas flipping sign periodically (bypass
//!   "bobbing")
//!
//! The window clears whenever the player touches the ground.

use serde::{Deserialize, Serialize};
use warden_physics::stats::{mean, peak_autocorrelation, regularity_score, sign_changes};
use warden_physics::quadratic_fit;
use warden_shared::SurfaceKind;

use super::{grounded, should_stand_down};
use crate::detector::components::{Debounce, DebounceConfig, SampleWindow};
use crate::detector::{Detector, DetectorContext, DetectorId, Finding};
use crate::error::{ConfigError, ConfigResult, DetectorError};
use crate::violation::DetectorSettings;

/// Trajectory detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// Accumulation settings.
    #[serde(flatten)]
    pub settings: DetectorSettings,
    /// Escalation settings.
    pub debounce: DebounceConfig,
    /// Airborne samples kept.
    pub window: usize,
    /// Samples required before judging.
    pub min_samples: usize,
    /// Allowed curvature difference from the model.
    pub curvature_tolerance: f64,
    /// Fit error above which the curve is not treated as a parabola.
    pub max_fit_mse: f64,
    /// Mean per-tick disagreement with gravity required for a step pattern.
    pub model_error_tolerance: f64,
    /// Delta regularity at or above which motion is a constant step.
    pub step_regularity: f64,
    /// Mean `|dy|` below which steps are ignored.
    pub step_min_rate: f64,
    /// Sign flips required for oscillation.
    pub oscillation_min_sign_changes: usize,
    /// Autocorrelation required for oscillation.
    pub oscillation_min_autocorrelation: f64,
    /// `|dy|` ignored when counting sign flips.
    pub oscillation_dead_zone: f64,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            settings: DetectorSettings::default(),
            debounce: DebounceConfig::new(5, 8.0),
            window: 20,
            min_samples: 8,
            curvature_tolerance: 0.02,
            max_fit_mse: 1e-3,
            model_error_tolerance: 0.02,
            step_regularity: 0.97,
            step_min_rate: 0.02,
            oscillation_min_sign_changes: 4,
            oscillation_min_autocorrelation: 0.7,
            oscillation_dead_zone: 0.005,
        }
    }
}

impl TrajectoryConfig {
    pub(crate) fn validate(&self) -> ConfigResult<()> {
        self.debounce.validate()?;
        if self.min_samples < 4 || self.min_samples > self.window {
            return Err(ConfigError::out_of_range(
                "min_samples",
                format!("must be in 4..={}, got {}", self.window, self.min_samples),
            ));
        }
        Ok(())
    }
}

/// Shape of the airborne height curve.
#[derive(Debug)]
pub struct TrajectoryDetector {
    config: TrajectoryConfig,
    heights: SampleWindow<f64>,
    deltas: SampleWindow<f64>,
    debounce: Debounce,
}

impl TrajectoryDetector {
    /// Creates the detector.
    #[must_use]
    pub fn new(config: &TrajectoryConfig) -> Self {
        Self {
            config: config.clone(),
            heights: SampleWindow::new(config.window),
            deltas: SampleWindow::new(config.window),
            debounce: Debounce::new(config.debounce),
        }
    }

    fn clear_window(&mut self) {
        self.heights.clear();
        self.deltas.clear();
    }

    fn analyze(&self, ctx: &DetectorContext<'_>) -> Result<Option<String>, DetectorError> {
        let model = &ctx.physics.gravity;
        let slow = ctx.obs().effects.slow_falling;
        let heights = self.heights.to_vec();
        let deltas = self.deltas.to_vec();
        let n = heights.len();
        let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();

        // Mean disagreement with a tick-by-tick gravity prediction.
        let model_error = mean(
            &deltas
                .windows(2)
                .map(|w| (w[1] - model.predict_next_vertical_position(w[0], false, slow)).abs())
                .collect::<Vec<_>>(),
        );
        let tolerance = ctx.tolerance.scale();

        let fit = quadratic_fit(&xs, &heights)?;
        let initial = deltas.first().copied().unwrap_or_default();
        let expected = quadratic_fit(&xs, &model.simulate_fall(initial, n, slow))?;
        let curvature_gap = (fit.a - expected.a).abs();
        if fit.residual_mse <= self.config.max_fit_mse
            && curvature_gap > self.config.curvature_tolerance * tolerance
        {
            return Ok(Some(format!(
                "parabola mismatch: curvature={:.4} expected={:.4}",
                fit.a, expected.a
            )));
        }

        let regularity = regularity_score(&deltas);
        let rate = mean(&deltas);
        if regularity >= self.config.step_regularity
            && rate.abs() > self.config.step_min_rate
            && model_error > self.config.model_error_tolerance * tolerance
        {
            return Ok(Some(format!(
                "constant step: dy={rate:.4} regularity={regularity:.3}"
            )));
        }

        let flips = sign_changes(&deltas, self.config.oscillation_dead_zone);
        if flips >= self.config.oscillation_min_sign_changes {
            if let Some((lag, correlation)) = peak_autocorrelation(&deltas, 2, n / 2) {
                if correlation >= self.config.oscillation_min_autocorrelation {
                    return Ok(Some(format!(
                        "oscillation: sign_changes={flips} period={lag} autocorrelation={correlation:.3}"
                    )));
                }
            }
        }

        Ok(None)
    }
}

impl Detector for TrajectoryDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Trajectory
    }

    fn observe(&mut self, ctx: &DetectorContext<'_>) -> Result<Option<Finding>, DetectorError> {
        let obs = ctx.obs();
        if !obs.kind.has_position() {
            return Ok(None);
        }
        ctx.require_finite_motion()?;
        let bouncy = matches!(
            obs.environment.surface,
            Some(SurfaceKind::Slime | SurfaceKind::Honey)
        );
        if should_stand_down(ctx) || bouncy {
            self.reset();
            return Ok(None);
        }
        if grounded(obs.client_on_ground, obs.server_on_ground) {
            self.clear_window();
            self.debounce.clean();
            return Ok(None);
        }

        if ctx.motion.last_position.is_none() {
            return Ok(None);
        }
        self.heights.push(obs.position.y);
        self.deltas.push(obs.delta.y);

        if self.heights.len() < self.config.min_samples {
            return Ok(None);
        }

        let Some(evidence) = self.analyze(ctx)? else {
            self.debounce.clean();
            return Ok(None);
        };
        let Some(buffer) = self.debounce.exceed() else {
            return Ok(None);
        };
        Ok(Some(ctx.finding(
            DetectorId::Trajectory,
            self.config.settings.weight,
            format!("{evidence} buffer={buffer:.1}"),
        )))
    }

    fn reset(&mut self) {
        self.clear_window();
        self.debounce.reset();
    }
}

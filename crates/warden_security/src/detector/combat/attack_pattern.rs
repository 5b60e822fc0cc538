//! # Attack Pattern Detector
//!
//! Human clicking is noisy. Auto-clickers and kill auras fire on a timer, so
//! the spread of their inter-attack intervals collapses towards zero.
//!
//! Intervals longer than `max_interval_ms` mean the fight paused; the window
//! starts over instead of mixing two engagements.

use serde::{Deserialize, Serialize};
use warden_physics::{mean, std_dev};

use crate::detector::components::{Debounce, DebounceConfig, SampleWindow};
use crate::detector::{Detector, DetectorContext, DetectorId, Finding};
use crate::error::{ConfigError, ConfigResult, DetectorError};
use crate::observation::ObservationKind;
use crate::violation::DetectorSettings;

/// Attack pattern detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackPatternConfig {
    /// Accumulation settings.
    #[serde(flatten)]
    pub settings: DetectorSettings,
    /// Escalation settings.
    pub debounce: DebounceConfig,
    /// Intervals kept.
    pub window: usize,
    /// Intervals required before judging.
    pub min_intervals: usize,
    /// Gap that ends an engagement.
    pub max_interval_ms: u64,
    /// Standard deviation below which clicking is machine-regular.
    pub min_std_dev_ms: f64,
}

impl Default for AttackPatternConfig {
    fn default() -> Self {
        Self {
            settings: DetectorSettings::with_max(5.0),
            debounce: DebounceConfig::new(3, 3.0),
            window: 20,
            min_intervals: 10,
            max_interval_ms: 1_000,
            min_std_dev_ms: 10.0,
        }
    }
}

impl AttackPatternConfig {
    pub(crate) fn validate(&self) -> ConfigResult<()> {
        self.debounce.validate()?;
        if self.min_intervals < 2 || self.min_intervals > self.window {
            return Err(ConfigError::out_of_range(
                "min_intervals",
                format!("must be in [2, window], got {} with window {}", self.min_intervals, self.window),
            ));
        }
        if !(self.min_std_dev_ms >= 0.0) {
            return Err(ConfigError::out_of_range(
                "min_std_dev_ms",
                format!("must be non-negative, got {}", self.min_std_dev_ms),
            ));
        }
        Ok(())
    }
}

/// Inter-attack interval variance.
#[derive(Debug)]
pub struct AttackPatternDetector {
    config: AttackPatternConfig,
    intervals: SampleWindow<f64>,
    debounce: Debounce,
}

impl AttackPatternDetector {
    /// Creates the detector.
    #[must_use]
    pub fn new(config: &AttackPatternConfig) -> Self {
        Self {
            config: config.clone(),
            intervals: SampleWindow::new(config.window),
            debounce: Debounce::new(config.debounce),
        }
    }
}

impl Detector for AttackPatternDetector {
    fn id(&self) -> DetectorId {
        DetectorId::AttackPattern
    }

    fn observe(&mut self, ctx: &DetectorContext<'_>) -> Result<Option<Finding>, DetectorError> {
        if !matches!(ctx.obs().kind, ObservationKind::Attack { .. }) {
            return Ok(None);
        }
        if ctx.is_exempt() {
            self.reset();
            return Ok(None);
        }
        let Some(previous) = ctx.combat.last_attack_ms else {
            return Ok(None);
        };

        let interval = ctx.now_ms().saturating_sub(previous);
        if interval > self.config.max_interval_ms {
            self.intervals.clear();
            self.debounce.clean();
            return Ok(None);
        }
        self.intervals.push(interval as f64);
        if self.intervals.len() < self.config.min_intervals {
            return Ok(None);
        }

        let samples = self.intervals.to_vec();
        let spread = std_dev(&samples);
        if spread >= self.config.min_std_dev_ms {
            self.debounce.clean();
            return Ok(None);
        }
        let Some(buffer) = self.debounce.exceed() else {
            return Ok(None);
        };
        Ok(Some(ctx.finding(
            DetectorId::AttackPattern,
            self.config.settings.weight,
            format!(
                "interval σ={spread:.2}ms mean={:.1}ms over {} attacks buffer={buffer:.1}",
                mean(&samples),
                samples.len()
            ),
        )))
    }

    fn reset(&mut self) {
        self.intervals.clear();
        self.debounce.reset();
    }
}

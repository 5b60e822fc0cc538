//! # Attack Rate Detector
//!
//! Counts attacks inside a sliding time window. Sustained rates above what a
//! human hand can click are automation.

use serde::{Deserialize, Serialize};

use crate::detector::components::{Debounce, DebounceConfig, SampleWindow};
use crate::detector::{Detector, DetectorContext, DetectorId, Finding};
use crate::error::{ConfigError, ConfigResult, DetectorError};
use crate::observation::ObservationKind;
use crate::violation::DetectorSettings;

/// Attack rate detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackRateConfig {
    /// Accumulation settings.
    #[serde(flatten)]
    pub settings: DetectorSettings,
    /// Escalation settings.
    pub debounce: DebounceConfig,
    /// Sliding window length.
    pub window_ms: u64,
    /// Most attacks a human lands inside one window.
    pub max_attacks: u32,
}

impl Default for AttackRateConfig {
    fn default() -> Self {
        Self {
            settings: DetectorSettings::default(),
            debounce: DebounceConfig::new(3, 3.0),
            window_ms: 1_000,
            max_attacks: 20,
        }
    }
}

impl AttackRateConfig {
    pub(crate) fn validate(&self) -> ConfigResult<()> {
        self.debounce.validate()?;
        if self.window_ms == 0 {
            return Err(ConfigError::out_of_range("window_ms", "must be positive"));
        }
        if self.max_attacks == 0 {
            return Err(ConfigError::out_of_range("max_attacks", "must be positive"));
        }
        Ok(())
    }
}

/// Attacks per second.
#[derive(Debug)]
pub struct AttackRateDetector {
    config: AttackRateConfig,
    attacks: SampleWindow<u64>,
    debounce: Debounce,
}

impl AttackRateDetector {
    /// Creates the detector.
    #[must_use]
    pub fn new(config: &AttackRateConfig) -> Self {
        let capacity = (config.max_attacks as usize + 1) * 4;
        Self {
            config: config.clone(),
            attacks: SampleWindow::new(capacity),
            debounce: Debounce::new(config.debounce),
        }
    }
}

impl Detector for AttackRateDetector {
    fn id(&self) -> DetectorId {
        DetectorId::AttackRate
    }

    fn observe(&mut self, ctx: &DetectorContext<'_>) -> Result<Option<Finding>, DetectorError> {
        if !matches!(ctx.obs().kind, ObservationKind::Attack { .. }) {
            return Ok(None);
        }
        if ctx.is_exempt() {
            self.reset();
            return Ok(None);
        }

        let now = ctx.now_ms();
        let window = self.config.window_ms;
        self.attacks.push(now);
        self.attacks.evict_while(|&t| t.saturating_add(window) <= now);

        let count = self.attacks.len();
        let limit = ctx.tolerance.apply(f64::from(self.config.max_attacks));
        if count as f64 <= limit {
            self.debounce.clean();
            return Ok(None);
        }
        let Some(buffer) = self.debounce.exceed() else {
            return Ok(None);
        };
        Ok(Some(ctx.finding(
            DetectorId::AttackRate,
            self.config.settings.weight,
            format!("{count} attacks in {window}ms (limit {limit:.0}) buffer={buffer:.1}"),
        )))
    }

    fn reset(&mut self) {
        self.attacks.clear();
        self.debounce.reset();
    }
}

//! # Swing Timing Detector
//!
//! A real client swings its arm, then sends the attack. Kill auras often
//! skip the swing or send it out of step.
//!
//! An attack is suspicious when no swing precedes it, when no new swing
//! arrived since the previous attack, or when the swing is older than a
//! ping-adjusted delay.

use serde::{Deserialize, Serialize};

use crate::detector::components::{Debounce, DebounceConfig};
use crate::detector::{Detector, DetectorContext, DetectorId, Finding};
use crate::error::DetectorError;
use crate::observation::ObservationKind;
use crate::violation::DetectorSettings;

/// Swing timing detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwingTimingConfig {
    /// Accumulation settings.
    #[serde(flatten)]
    pub settings: DetectorSettings,
    /// Escalation settings.
    pub debounce: DebounceConfig,
    /// Largest swing-to-attack delay at ideal conditions.
    pub max_delay_ms: f64,
    /// Require a fresh swing for every attack.
    pub swing_per_attack: bool,
}

impl Default for SwingTimingConfig {
    fn default() -> Self {
        Self {
            settings: DetectorSettings::default(),
            debounce: DebounceConfig::new(2, 3.0),
            max_delay_ms: 150.0,
            swing_per_attack: true,
        }
    }
}

/// Attacks without a matching swing.
#[derive(Debug)]
pub struct SwingTimingDetector {
    config: SwingTimingConfig,
    debounce: Debounce,
}

impl SwingTimingDetector {
    /// Creates the detector.
    #[must_use]
    pub fn new(config: &SwingTimingConfig) -> Self {
        Self {
            config: config.clone(),
            debounce: Debounce::new(config.debounce),
        }
    }

    fn judge(&self, ctx: &DetectorContext<'_>) -> Option<String> {
        let now = ctx.now_ms();
        let Some(swing) = ctx.combat.last_swing_ms else {
            return Some("attack without swing".into());
        };
        if swing > now {
            return Some(format!("attack stamped {}ms before swing", swing - now));
        }
        if self.config.swing_per_attack
            && ctx.combat.last_attack_ms.is_some_and(|attack| attack >= swing)
        {
            return Some("no swing since previous attack".into());
        }
        let delay = (now - swing) as f64;
        let allowed = ctx.tolerance.apply(self.config.max_delay_ms);
        (delay > allowed).then(|| format!("attack {delay:.0}ms after swing (allowed {allowed:.0}ms)"))
    }
}

impl Detector for SwingTimingDetector {
    fn id(&self) -> DetectorId {
        DetectorId::SwingTiming
    }

    fn observe(&mut self, ctx: &DetectorContext<'_>) -> Result<Option<Finding>, DetectorError> {
        if !matches!(ctx.obs().kind, ObservationKind::Attack { .. }) {
            return Ok(None);
        }
        if ctx.is_exempt() {
            self.reset();
            return Ok(None);
        }

        let Some(evidence) = self.judge(ctx) else {
            self.debounce.clean();
            return Ok(None);
        };
        let Some(buffer) = self.debounce.exceed() else {
            return Ok(None);
        };
        Ok(Some(ctx.finding(
            DetectorId::SwingTiming,
            self.config.settings.weight,
            format!("{evidence} buffer={buffer:.1}"),
        )))
    }

    fn reset(&mut self) {
        self.debounce.reset();
    }
}

//! # Dead Action Detector
//!
//! Dead players cannot attack, swing or interact. Actions that arrive inside
//! a short grace period after death were in flight when the player died and
//! are ignored.

use serde::{Deserialize, Serialize};

use crate::detector::components::{Debounce, DebounceConfig};
use crate::detector::{Detector, DetectorContext, DetectorId, Finding};
use crate::error::DetectorError;
use crate::observation::ObservationKind;
use crate::violation::DetectorSettings;

/// Dead action detector settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadActionConfig {
    /// Accumulation settings.
    #[serde(flatten)]
    pub settings: DetectorSettings,
    /// Escalation settings.
    pub debounce: DebounceConfig,
    /// Time after death during which actions are still in flight.
    pub grace_ms: u64,
}

impl Default for DeadActionConfig {
    fn default() -> Self {
        Self {
            settings: DetectorSettings::with_max(4.0),
            debounce: DebounceConfig::new(1, 2.0),
            grace_ms: 150,
        }
    }
}

/// Actions while dead.
#[derive(Debug)]
pub struct DeadActionDetector {
    config: DeadActionConfig,
    debounce: Debounce,
}

impl DeadActionDetector {
    /// Creates the detector.
    #[must_use]
    pub fn new(config: &DeadActionConfig) -> Self {
        Self {
            config: config.clone(),
            debounce: Debounce::new(config.debounce),
        }
    }
}

impl Detector for DeadActionDetector {
    fn id(&self) -> DetectorId {
        DetectorId::DeadAction
    }

    fn observe(&mut self, ctx: &DetectorContext<'_>) -> Result<Option<Finding>, DetectorError> {
        let obs = ctx.obs();
        let revived = obs.alive && !ctx.combat.alive;
        if matches!(obs.kind, ObservationKind::Respawn) || revived {
            self.reset();
            return Ok(None);
        }
        if !obs.kind.is_action() {
            return Ok(None);
        }
        if obs.alive {
            self.debounce.clean();
            return Ok(None);
        }
        if ctx.is_exempt() {
            return Ok(None);
        }

        let now = ctx.now_ms();
        // Death arriving with this very observation has no recorded time yet.
        let died_at = if ctx.combat.alive {
            now
        } else {
            ctx.combat.died_at_ms.unwrap_or(0)
        };
        let since_death = now.saturating_sub(died_at);
        if since_death < self.config.grace_ms {
            return Ok(None);
        }

        let Some(buffer) = self.debounce.exceed() else {
            return Ok(None);
        };
        Ok(Some(ctx.finding(
            DetectorId::DeadAction,
            self.config.settings.weight,
            format!(
                "{:?} {since_death}ms after death buffer={buffer:.1}",
                obs.kind
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

    const ATTACK: ObservationKind = ObservationKind::Attack { target: 4 };

    fn die(harness: &mut Harness, detector: &mut DeadActionDetector, at: u64) {
        let obs = Observation::builder(0, at).kind(ObservationKind::Death).alive(false).build();
        assert!(harness.feed(detector, obs).is_none());
    }

    fn act(harness: &mut Harness, detector: &mut DeadActionDetector, seq: u64, at: u64, alive: bool) -> Option<Finding> {
        let obs = Observation::builder(seq, at).kind(ATTACK).alive(alive).build();
        harness.feed(detector, obs)
    }

    #[test]
    fn test_second_dead_attack_flags() {
        let mut harness = Harness::new();
        let mut detector = DeadActionDetector::new(&DeadActionConfig::default());
        die(&mut harness, &mut detector, 10_000);
        assert!(act(&mut harness, &mut detector, 1, 10_500, false).is_none());
        let finding = act(&mut harness, &mut detector, 2, 11_000, false).expect("second dead attack");
        assert_eq!(finding.detector, DetectorId::DeadAction);
    }

    #[test]
    fn test_in_flight_actions_are_ignored() {
        let mut harness = Harness::new();
        let mut detector = DeadActionDetector::new(&DeadActionConfig::default());
        die(&mut harness, &mut detector, 10_000);
        for (seq, at) in [(1, 10_020), (2, 10_060), (3, 10_120)] {
            assert!(act(&mut harness, &mut detector, seq, at, false).is_none());
        }
    }

    #[test]
    fn test_respawn_resets() {
        let mut harness = Harness::new();
        let mut detector = DeadActionDetector::new(&DeadActionConfig::default());
        die(&mut harness, &mut detector, 10_000);
        assert!(act(&mut harness, &mut detector, 1, 10_500, false).is_none());
        let respawn = Observation::builder(2, 10_600).kind(ObservationKind::Respawn).build();
        assert!(harness.feed(&mut detector, respawn).is_none());
        assert!(act(&mut harness, &mut detector, 3, 10_700, true).is_none());
        die(&mut harness, &mut detector, 20_000);
        assert!(act(&mut harness, &mut detector, 4, 20_500, false).is_none());
    }
}

//! # Violation Accumulation
//!
//! Findings are not verdicts. Each one adds its weight to a per-detector
//! score; only when the score crosses the detector's ceiling does a
//! [`FlagEvent`] leave the engine.
//!
//! ```text
//! record:  score += weight
//!          if score >= max_violation:
//!              emit FlagEvent(score); score = min(score, max) * retain_ratio
//! decay:   score = max(0, score - decay)
//! ```
//!
//! The score is never negative and never reset to zero by a flag, so a
//! player who keeps cheating re-flags sooner than one who stopped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use warden_shared::PlayerId;

use crate::config::DetectorsConfig;
use crate::detector::{DetectorId, Finding};
use crate::error::{ConfigError, ConfigResult};

/// Per-detector accumulation settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Whether the detector is instantiated at join.
    pub enabled: bool,
    /// Weight of one finding.
    pub weight: f64,
    /// Score at which a flag event fires.
    pub max_violation: f64,
    /// Fraction of the score kept after a flag.
    pub retain_ratio: f64,
    /// Score removed per `decay_all`.
    pub decay: f64,
    /// Flag count at which flag events carry the punish marker.
    pub punish_after_flags: Option<u32>,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.0,
            max_violation: 10.0,
            retain_ratio: 0.5,
            decay: 0.5,
            punish_after_flags: None,
        }
    }
}

impl DetectorSettings {
    /// Default settings with a different ceiling.
    #[must_use]
    pub fn with_max(max_violation: f64) -> Self {
        Self {
            max_violation,
            ..Self::default()
        }
    }

    /// Checks ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::OutOfRange`] naming the first out-of-range field.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.weight >= 0.0) || !self.weight.is_finite() {
            return Err(ConfigError::out_of_range(
                "weight",
                format!("must be finite and non-negative, got {}", self.weight),
            ));
        }
        if !(self.max_violation > 0.0) {
            return Err(ConfigError::out_of_range(
                "max_violation",
                format!("must be positive, got {}", self.max_violation),
            ));
        }
        if !(self.retain_ratio > 0.0 && self.retain_ratio < 1.0) {
            return Err(ConfigError::out_of_range(
                "retain_ratio",
                format!("must be in (0, 1), got {}", self.retain_ratio),
            ));
        }
        if !(self.decay >= 0.0) {
            return Err(ConfigError::out_of_range(
                "decay",
                format!("must be non-negative, got {}", self.decay),
            ));
        }
        if self.punish_after_flags == Some(0) {
            return Err(ConfigError::out_of_range("punish_after_flags", "must be at least 1"));
        }
        Ok(())
    }
}

/// A detector's score crossed its ceiling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlagEvent {
    /// Flagged player.
    pub player: PlayerId,
    /// Detector whose score crossed.
    pub detector: DetectorId,
    /// Score at the moment of crossing.
    pub score: f64,
    /// Flags this session for this detector, including this one.
    pub flag_count: u32,
    /// Evidence of the finding that crossed the ceiling.
    pub evidence: String,
    /// Observation time.
    pub timestamp_ms: u64,
    /// Set once the per-detector punishment ceiling is reached.
    pub punish: bool,
}

/// One detector's score.
#[derive(Clone, Debug)]
pub struct ViolationAccumulator {
    settings: DetectorSettings,
    score: f64,
    flags: u32,
}

impl ViolationAccumulator {
    /// Zero score.
    #[must_use]
    pub fn new(settings: DetectorSettings) -> Self {
        Self {
            settings,
            score: 0.0,
            flags: 0,
        }
    }

    /// Adds `weight`. Returns the score at crossing if the ceiling was hit.
    pub fn record(&mut self, weight: f64) -> Option<f64> {
        if !weight.is_finite() || weight <= 0.0 {
            return None;
        }
        self.score += weight;
        if self.score >= self.settings.max_violation {
            let crossed = self.score;
            // Always land below the ceiling, however large the weight.
            self.score = crossed.min(self.settings.max_violation) * self.settings.retain_ratio;
            self.flags = self.flags.saturating_add(1);
            return Some(crossed);
        }
        None
    }

    /// Decays the score by the configured amount.
    pub fn decay(&mut self) {
        self.score = (self.score - self.settings.decay).max(0.0);
    }

    /// Current score.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Overrides the score, clamped to be non-negative.
    pub fn set_score(&mut self, value: f64) {
        self.score = if value.is_finite() { value.max(0.0) } else { 0.0 };
    }

    /// Flags raised so far.
    #[must_use]
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Whether the punishment ceiling has been reached.
    #[must_use]
    pub fn should_punish(&self) -> bool {
        self.settings
            .punish_after_flags
            .is_some_and(|limit| self.flags >= limit)
    }
}

/// Every accumulator of one player.
#[derive(Clone, Debug)]
pub struct ViolationLedger {
    player: PlayerId,
    accumulators: BTreeMap<DetectorId, ViolationAccumulator>,
}

impl ViolationLedger {
    /// Zeroed ledger with an accumulator for every detector.
    #[must_use]
    pub fn new(player: PlayerId, config: &DetectorsConfig) -> Self {
        let accumulators = DetectorId::ALL
            .into_iter()
            .map(|id| (id, ViolationAccumulator::new(*config.settings(id))))
            .collect();
        Self {
            player,
            accumulators,
        }
    }

    /// Routes a finding to its detector's accumulator.
    pub fn record_finding(&mut self, finding: &Finding) -> Option<FlagEvent> {
        self.record(
            finding.detector,
            finding.severity,
            &finding.evidence,
            finding.source.timestamp_ms,
        )
    }

    /// Adds `weight` to `detector`. Returns a flag event on crossing.
    pub fn record(
        &mut self,
        detector: DetectorId,
        weight: f64,
        evidence: &str,
        timestamp_ms: u64,
    ) -> Option<FlagEvent> {
        let accumulator = self.accumulators.get_mut(&detector)?;
        let score = accumulator.record(weight)?;
        Some(FlagEvent {
            player: self.player,
            detector,
            score,
            flag_count: accumulator.flags(),
            evidence: evidence.to_owned(),
            timestamp_ms,
            punish: accumulator.should_punish(),
        })
    }

    /// Decays every accumulator.
    pub fn decay_all(&mut self) {
        for accumulator in self.accumulators.values_mut() {
            accumulator.decay();
        }
    }

    /// Current score of `detector`.
    #[must_use]
    pub fn level(&self, detector: DetectorId) -> f64 {
        self.accumulators
            .get(&detector)
            .map_or(0.0, ViolationAccumulator::score)
    }

    /// Overrides the score of `detector`, clamped to be non-negative.
    pub fn set_level(&mut self, detector: DetectorId, value: f64) {
        if let Some(accumulator) = self.accumulators.get_mut(&detector) {
            accumulator.set_score(value);
        }
    }

    /// Flags raised by `detector`.
    #[must_use]
    pub fn flag_count(&self, detector: DetectorId) -> u32 {
        self.accumulators
            .get(&detector)
            .map_or(0, ViolationAccumulator::flags)
    }

    /// Non-zero scores, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(DetectorId, f64)> {
        self.accumulators
            .iter()
            .filter(|(_, a)| a.score() > 0.0)
            .map(|(id, a)| (*id, a.score()))
            .collect()
    }
}

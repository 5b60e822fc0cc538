//! # Detectors
//!
//! Per-player, per-behavior state machines. Each consumes one
//! [`Observation`] at a time through a [`DetectorContext`] and may return a
//! [`Finding`].
//!
//! ## Registry
//!
//! ```text
//! DetectorId::ALL ──► build_detector(id, config) ──► Box<dyn Detector>
//! ```
//!
//! Adding a detector means adding a variant; the match in
//! [`build_detector`] is exhaustive, so the compiler finds every place that
//! needs updating.

pub mod combat;
pub mod components;
pub mod movement;
pub mod packet_timing;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warden_physics::{GravityModel, SpeedModel};
use warden_shared::PlayerId;

use crate::config::DetectorsConfig;
use crate::environment::EnvironmentOracle;
use crate::error::DetectorError;
use crate::exemption::{ExemptionReason, ExemptionWindows};
use crate::observation::Observation;
use crate::player::{CombatLog, MotionHistory};
use components::Tolerance;

/// Identifies a detector variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorId {
    /// Vertical motion vs. gravity prediction.
    Gravity,
    /// Horizontal displacement vs. legal maximum.
    Speed,
    /// Shape of the airborne height curve.
    Trajectory,
    /// Movement through solid geometry.
    Phase,
    /// Client ground claim vs. server ground state.
    GroundSpoof,
    /// Mid-air direction changes.
    AirStrafe,
    /// Sprinting away from the facing direction.
    KeepSprint,
    /// Attacks without a matching swing.
    SwingTiming,
    /// Attacks per second.
    AttackRate,
    /// Inter-attack interval variance.
    AttackPattern,
    /// Actions while dead.
    DeadAction,
    /// Missing sprint-attack slowdown.
    SprintHit,
    /// Movement packet cadence.
    PacketTiming,
}

/// Broad detector family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DetectorCategory {
    /// Position and rotation checks.
    Movement,
    /// Attack and action checks.
    Combat,
    /// Packet cadence checks.
    Packet,
}

impl DetectorId {
    /// Every detector, in registration order.
    pub const ALL: [Self; 13] = [
        Self::Gravity,
        Self::Speed,
        Self::Trajectory,
        Self::Phase,
        Self::GroundSpoof,
        Self::AirStrafe,
        Self::KeepSprint,
        Self::SwingTiming,
        Self::AttackRate,
        Self::AttackPattern,
        Self::DeadAction,
        Self::SprintHit,
        Self::PacketTiming,
    ];

    /// Stable short name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gravity => "gravity",
            Self::Speed => "speed",
            Self::Trajectory => "trajectory",
            Self::Phase => "phase",
            Self::GroundSpoof => "ground_spoof",
            Self::AirStrafe => "air_strafe",
            Self::KeepSprint => "keep_sprint",
            Self::SwingTiming => "swing_timing",
            Self::AttackRate => "attack_rate",
            Self::AttackPattern => "attack_pattern",
            Self::DeadAction => "dead_action",
            Self::SprintHit => "sprint_hit",
            Self::PacketTiming => "packet_timing",
        }
    }

    /// Family this detector belongs to.
    #[must_use]
    pub const fn category(self) -> DetectorCategory {
        match self {
            Self::Gravity
            | Self::Speed
            | Self::Trajectory
            | Self::Phase
            | Self::GroundSpoof
            | Self::AirStrafe
            | Self::KeepSprint => DetectorCategory::Movement,
            Self::SwingTiming
            | Self::AttackRate
            | Self::AttackPattern
            | Self::DeadAction
            | Self::SprintHit => DetectorCategory::Combat,
            Self::PacketTiming => DetectorCategory::Packet,
        }
    }

    /// Whether this is a movement detector.
    #[must_use]
    pub const fn is_movement(self) -> bool {
        matches!(self.category(), DetectorCategory::Movement)
    }
}

impl std::fmt::Display for DetectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Evidence that a single observation looked implausible.
#[derive(Clone, Debug)]
pub struct Finding {
    /// Detector that produced it.
    pub detector: DetectorId,
    /// Weight added to the detector's accumulator.
    pub severity: f64,
    /// Human-readable evidence.
    pub evidence: String,
    /// Observation that triggered it.
    pub source: Arc<Observation>,
}

/// Physics models shared by every detector of an engine.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhysicsModels {
    /// Vertical motion model.
    pub gravity: GravityModel,
    /// Horizontal speed model.
    pub speed: SpeedModel,
}

/// Everything a detector may read while consuming one observation.
///
/// History reflects the state *before* this observation; the engine applies
/// the observation to the history after every detector has run.
pub struct DetectorContext<'a> {
    /// Player being observed.
    pub player: PlayerId,
    /// Observation being judged.
    pub source: &'a Arc<Observation>,
    /// Motion history before this observation.
    pub motion: &'a MotionHistory,
    /// Combat log before this observation.
    pub combat: &'a CombatLog,
    /// Exemption windows.
    pub exemptions: &'a ExemptionWindows,
    /// World queries.
    pub environment: &'a dyn EnvironmentOracle,
    /// Tolerance for this observation.
    pub tolerance: Tolerance,
    /// Physics models.
    pub physics: &'a PhysicsModels,
}

impl DetectorContext<'_> {
    /// The observation.
    #[must_use]
    pub fn obs(&self) -> &Observation {
        self.source
    }

    /// Observation time.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.source.timestamp_ms
    }

    /// Whether any exemption window is active.
    #[must_use]
    pub fn is_exempt(&self) -> bool {
        self.exemptions.is_exempt(self.now_ms())
    }

    /// Whether a window for any of `reasons` is active.
    #[must_use]
    pub fn is_exempt_for(&self, reasons: &[ExemptionReason]) -> bool {
        self.exemptions.is_exempt_for(self.now_ms(), reasons)
    }

    /// Fails with [`DetectorError::MalformedObservation`] on non-finite motion.
    ///
    /// # Errors
    ///
    /// Non-finite position, delta or rotation.
    pub fn require_finite_motion(&self) -> Result<(), DetectorError> {
        self.source
            .validate_motion()
            .map_err(DetectorError::MalformedObservation)
    }

    /// Builds a finding citing this observation.
    #[must_use]
    pub fn finding(&self, detector: DetectorId, severity: f64, evidence: String) -> Finding {
        Finding {
            detector,
            severity,
            evidence,
            source: Arc::clone(self.source),
        }
    }
}

/// A per-player behavior check.
pub trait Detector: Send {
    /// Which detector this is.
    fn id(&self) -> DetectorId;

    /// Consumes one observation.
    ///
    /// # Errors
    ///
    /// Malformed input or degenerate math. The engine logs the error and
    /// keeps running the other detectors.
    fn observe(&mut self, ctx: &DetectorContext<'_>) -> Result<Option<Finding>, DetectorError>;

    /// Clears all rolling state.
    fn reset(&mut self);
}

/// Instantiates one detector from configuration.
#[must_use]
pub fn build_detector(id: DetectorId, config: &DetectorsConfig) -> Box<dyn Detector> {
    match id {
        DetectorId::Gravity => Box::new(movement::GravityDetector::new(&config.gravity)),
        DetectorId::Speed => Box::new(movement::SpeedDetector::new(&config.speed)),
        DetectorId::Trajectory => Box::new(movement::TrajectoryDetector::new(&config.trajectory)),
        DetectorId::Phase => Box::new(movement::PhaseDetector::new(&config.phase)),
        DetectorId::GroundSpoof => Box::new(movement::GroundSpoofDetector::new(&config.ground_spoof)),
        DetectorId::AirStrafe => Box::new(movement::AirStrafeDetector::new(&config.air_strafe)),
        DetectorId::KeepSprint => Box::new(movement::KeepSprintDetector::new(&config.keep_sprint)),
        DetectorId::SwingTiming => Box::new(combat::SwingTimingDetector::new(&config.swing_timing)),
        DetectorId::AttackRate => Box::new(combat::AttackRateDetector::new(&config.attack_rate)),
        DetectorId::AttackPattern => Box::new(combat::AttackPatternDetector::new(&config.attack_pattern)),
        DetectorId::DeadAction => Box::new(combat::DeadActionDetector::new(&config.dead_action)),
        DetectorId::SprintHit => Box::new(combat::SprintHitDetector::new(&config.sprint_hit)),
        DetectorId::PacketTiming => Box::new(packet_timing::PacketTimingDetector::new(&config.packet_timing)),
    }
}

/// Instantiates every enabled detector, in registration order.
#[must_use]
pub fn build_enabled(config: &DetectorsConfig) -> Vec<Box<dyn Detector>> {
    DetectorId::ALL
        .into_iter()
        .filter(|id| config.settings(*id).enabled)
        .map(|id| build_detector(id, config))
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Context fixtures for detector unit tests.

    use super::*;
    use crate::environment::VoxelGrid;

    /// Owns everything a [`DetectorContext`] borrows.
    pub struct Harness {
        pub motion: MotionHistory,
        pub combat: CombatLog,
        pub exemptions: ExemptionWindows,
        pub world: VoxelGrid,
        pub physics: PhysicsModels,
        pub tolerance: Tolerance,
    }

    impl Harness {
        pub fn new() -> Self {
            Self {
                motion: MotionHistory::default(),
                combat: CombatLog::default(),
                exemptions: ExemptionWindows::new(),
                world: VoxelGrid::flat(64),
                physics: PhysicsModels::default(),
                tolerance: Tolerance::STRICT,
            }
        }

        /// Runs `detector` on `obs`, then applies `obs` to the history.
        pub fn feed(&mut self, detector: &mut dyn Detector, obs: Observation) -> Option<Finding> {
            let source = Arc::new(obs);
            let ctx = DetectorContext {
                player: PlayerId(1),
                source: &source,
                motion: &self.motion,
                combat: &self.combat,
                exemptions: &self.exemptions,
                environment: &self.world,
                tolerance: self.tolerance,
                physics: &self.physics,
            };
            let finding = detector.observe(&ctx).expect("detector failed");
            self.motion.apply(&source);
            self.combat.apply(&source);
            finding
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builds_every_detector() {
        let config = DetectorsConfig::default();
        for id in DetectorId::ALL {
            assert_eq!(build_detector(id, &config).id(), id);
        }
        assert_eq!(build_enabled(&config).len(), DetectorId::ALL.len());
    }

    #[test]
    fn test_disabled_detectors_are_skipped() {
        let mut config = DetectorsConfig::default();
        config.settings_mut(DetectorId::Trajectory).enabled = false;
        let built = build_enabled(&config);
        assert!(built.iter().all(|d| d.id() != DetectorId::Trajectory));
        assert_eq!(built.len(), DetectorId::ALL.len() - 1);
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = DetectorId::ALL.iter().map(|d| d.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), DetectorId::ALL.len());
    }
}

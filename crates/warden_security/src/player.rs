//! # Player State
//!
//! Everything the engine knows about one session: the detector set, motion
//! and combat history, ping estimate, violation ledger and exemption
//! windows. Created at join, destroyed at leave, always accessed under the
//! player's own lock.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};
use warden_shared::{EnvironmentFlags, PlayerId, Vec3};

use crate::config::EngineConfig;
use crate::detector::components::Tolerance;
use crate::detector::{build_enabled, Detector, DetectorContext, DetectorId, Finding, PhysicsModels};
use crate::environment::EnvironmentOracle;
use crate::error::DetectorError;
use crate::exemption::ExemptionWindows;
use crate::observation::{Observation, ObservationKind};
use crate::violation::ViolationLedger;

/// Movement history, as of the previous observation.
#[derive(Clone, Debug)]
pub struct MotionHistory {
    /// Last reported position.
    pub last_position: Option<Vec3>,
    /// Last movement-class delta.
    pub last_delta: Vec3,
    /// Last client ground claim.
    pub last_client_on_ground: bool,
    /// Last server ground state, if provided.
    pub last_server_on_ground: Option<bool>,
    /// Last environment flags.
    pub last_environment: EnvironmentFlags,
    /// Last yaw.
    pub last_yaw: f64,
    /// Last pitch.
    pub last_pitch: f64,
    /// Last sprint state.
    pub last_sprinting: bool,
    /// Last position that passed the phase check.
    pub last_safe_position: Option<Vec3>,
    /// Consecutive movement ticks airborne.
    pub airborne_ticks: u32,
    /// Consecutive movement ticks grounded.
    pub ground_ticks: u32,
    /// Arrival of the last movement-class observation.
    pub last_movement_ms: Option<u64>,
    /// Interval between the last two movement-class observations.
    pub last_interval_ms: Option<u64>,
    /// Movement-class observations seen.
    pub movement_ticks: u64,
}

impl Default for MotionHistory {
    fn default() -> Self {
        Self {
            last_position: None,
            last_delta: Vec3::ZERO,
            last_client_on_ground: true,
            last_server_on_ground: None,
            last_environment: EnvironmentFlags::default(),
            last_yaw: 0.0,
            last_pitch: 0.0,
            last_sprinting: false,
            last_safe_position: None,
            airborne_ticks: 0,
            ground_ticks: 0,
            last_movement_ms: None,
            last_interval_ms: None,
            movement_ticks: 0,
        }
    }
}

impl MotionHistory {
    /// Folds an observation into the history.
    pub fn apply(&mut self, obs: &Observation) {
        if obs.kind == ObservationKind::Teleport {
            self.last_position = Some(obs.position);
            self.last_delta = Vec3::ZERO;
            self.last_safe_position = Some(obs.position);
            return;
        }
        if !obs.kind.is_movement_class() {
            return;
        }

        if let Some(last) = self.last_movement_ms {
            self.last_interval_ms = Some(obs.timestamp_ms.saturating_sub(last));
        }
        self.last_movement_ms = Some(obs.timestamp_ms);
        self.movement_ticks += 1;

        if obs.kind.has_position() {
            self.last_position = Some(obs.position);
            self.last_delta = obs.delta;
        }
        if obs.kind.has_rotation() {
            self.last_yaw = obs.yaw;
            self.last_pitch = obs.pitch;
        }
        self.last_client_on_ground = obs.client_on_ground;
        self.last_server_on_ground = obs.server_on_ground;
        self.last_environment = obs.environment;
        self.last_sprinting = obs.sprinting;

        if obs.client_on_ground {
            self.ground_ticks = self.ground_ticks.saturating_add(1);
            self.airborne_ticks = 0;
        } else {
            self.airborne_ticks = self.airborne_ticks.saturating_add(1);
            self.ground_ticks = 0;
        }
    }

    /// Whether the last two movement messages arrived closer than `burst_ms`.
    #[must_use]
    pub fn in_burst(&self, burst_ms: u64) -> bool {
        self.last_interval_ms.is_some_and(|i| i < burst_ms)
    }
}

/// Combat history, as of the previous observation.
#[derive(Clone, Debug)]
pub struct CombatLog {
    /// Last swing.
    pub last_swing_ms: Option<u64>,
    /// Last attack.
    pub last_attack_ms: Option<u64>,
    /// Whether the last attack was made while sprinting.
    pub last_attack_sprinting: bool,
    /// Authoritative alive state.
    pub alive: bool,
    /// Last transition to dead.
    pub died_at_ms: Option<u64>,
    /// Last transition to alive.
    pub respawned_at_ms: Option<u64>,
    /// Attacks seen.
    pub attacks: u64,
}

impl Default for CombatLog {
    fn default() -> Self {
        Self {
            last_swing_ms: None,
            last_attack_ms: None,
            last_attack_sprinting: false,
            alive: true,
            died_at_ms: None,
            respawned_at_ms: None,
            attacks: 0,
        }
    }
}

impl CombatLog {
    /// Folds an observation into the log.
    pub fn apply(&mut self, obs: &Observation) {
        let now = obs.timestamp_ms;
        match obs.kind {
            ObservationKind::Swing => self.last_swing_ms = Some(now),
            ObservationKind::Attack { .. } => {
                self.last_attack_ms = Some(now);
                self.last_attack_sprinting = obs.sprinting;
                self.attacks += 1;
            }
            _ => {}
        }

        let alive = match obs.kind {
            ObservationKind::Death => false,
            ObservationKind::Respawn => true,
            _ => obs.alive,
        };
        if self.alive && !alive {
            self.died_at_ms = Some(now);
        } else if !self.alive && alive {
            self.respawned_at_ms = Some(now);
        }
        self.alive = alive;
    }
}

/// Exponentially weighted ping average.
#[derive(Clone, Debug)]
pub struct PingEstimator {
    smoothing: f64,
    estimate: Option<f64>,
}

impl PingEstimator {
    /// No samples yet.
    #[must_use]
    pub fn new(smoothing: f64) -> Self {
        Self {
            smoothing: smoothing.clamp(f64::EPSILON, 1.0),
            estimate: None,
        }
    }

    /// Folds a sample in and returns the new estimate.
    pub fn observe(&mut self, sample_ms: u32) -> f64 {
        let sample = f64::from(sample_ms);
        let next = match self.estimate {
            None => sample,
            Some(prev) => prev + self.smoothing * (sample - prev),
        };
        self.estimate = Some(next);
        next
    }

    /// Current estimate, zero before the first sample.
    #[must_use]
    pub fn estimate(&self) -> f64 {
        self.estimate.unwrap_or(0.0)
    }
}

/// Result of running the detector set once.
#[derive(Debug, Default)]
pub(crate) struct DetectorRun {
    pub findings: Vec<Finding>,
    pub failures: u32,
}

/// One session's detection state.
pub struct PlayerState {
    id: PlayerId,
    joined_at_ms: u64,
    last_sequence: Option<u64>,
    previous_leave_ms: Option<u64>,
    retired: bool,
    detectors: Vec<Box<dyn Detector>>,
    /// Per-detector violation scores.
    pub ledger: ViolationLedger,
    /// Active exemption windows.
    pub exemptions: ExemptionWindows,
    /// Movement history.
    pub motion: MotionHistory,
    /// Combat history.
    pub combat: CombatLog,
    /// Rolling ping estimate.
    pub ping: PingEstimator,
    observations: u64,
}

impl std::fmt::Debug for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerState")
            .field("id", &self.id)
            .field("joined_at_ms", &self.joined_at_ms)
            .field("last_sequence", &self.last_sequence)
            .field("previous_leave_ms", &self.previous_leave_ms)
            .field("detectors", &self.detector_ids())
            .field("observations", &self.observations)
            .finish_non_exhaustive()
    }
}

impl PlayerState {
    /// Fresh state with every enabled detector.
    #[must_use]
    pub fn new(id: PlayerId, joined_at_ms: u64, config: &EngineConfig) -> Self {
        Self {
            id,
            joined_at_ms,
            last_sequence: None,
            previous_leave_ms: None,
            retired: false,
            detectors: build_enabled(&config.detectors),
            ledger: ViolationLedger::new(id, &config.detectors),
            exemptions: ExemptionWindows::new(),
            motion: MotionHistory::default(),
            combat: CombatLog::default(),
            ping: PingEstimator::new(config.tolerance.ping_smoothing),
            observations: 0,
        }
    }

    /// Player id.
    #[must_use]
    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Join time.
    #[must_use]
    pub fn joined_at_ms(&self) -> u64 {
        self.joined_at_ms
    }

    /// Highest sequence accepted.
    #[must_use]
    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Observations processed.
    #[must_use]
    pub fn observations(&self) -> u64 {
        self.observations
    }

    /// Detectors in registration order.
    #[must_use]
    pub fn detector_ids(&self) -> Vec<DetectorId> {
        self.detectors.iter().map(|d| d.id()).collect()
    }

    /// Carries the sequence floor and leave time over from a previous
    /// session.
    pub(crate) fn inherit(&mut self, last_sequence: Option<u64>, left_at_ms: u64) {
        self.last_sequence = last_sequence;
        self.previous_leave_ms = Some(left_at_ms);
    }

    /// Whether an observation stamped `timestamp_ms` belongs to the previous
    /// session. A first session has nothing stale.
    #[must_use]
    pub fn is_stale(&self, timestamp_ms: u64) -> bool {
        self.previous_leave_ms.is_some_and(|left| timestamp_ms <= left)
    }

    /// Accepts `sequence` if it is newer than every sequence seen so far.
    pub(crate) fn accept_sequence(&mut self, sequence: u64) -> bool {
        if self.last_sequence.is_some_and(|last| sequence <= last) {
            return false;
        }
        self.last_sequence = Some(sequence);
        true
    }

    /// Marks the state as left. Anything still holding it must drop work.
    pub(crate) fn retire(&mut self) {
        self.retired = true;
    }

    /// Whether the player has left.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Runs every detector on one observation, isolating failures.
    pub(crate) fn run_detectors(
        &mut self,
        source: &Arc<Observation>,
        tolerance: Tolerance,
        environment: &dyn EnvironmentOracle,
        physics: &PhysicsModels,
    ) -> DetectorRun {
        let Self {
            id,
            detectors,
            motion,
            combat,
            exemptions,
            ..
        } = self;
        let ctx = DetectorContext {
            player: *id,
            source,
            motion,
            combat,
            exemptions,
            environment,
            tolerance,
            physics,
        };

        let mut run = DetectorRun::default();
        for detector in detectors.iter_mut() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| detector.observe(&ctx)));
            match outcome {
                Ok(Ok(Some(finding))) => run.findings.push(finding),
                Ok(Ok(None)) => {}
                Ok(Err(DetectorError::MalformedObservation(reason))) => {
                    debug!(player = %id, detector = %detector.id(), %reason, "Skipped malformed observation");
                }
                Ok(Err(err)) => {
                    warn!(player = %id, detector = %detector.id(), error = %err, "Detector failed, resetting");
                    detector.reset();
                    run.failures += 1;
                }
                Err(_) => {
                    warn!(player = %id, detector = %detector.id(), "Detector panicked, resetting");
                    detector.reset();
                    run.failures += 1;
                }
            }
        }
        run
    }

    /// Applies an observation to the history once every detector has seen it.
    pub(crate) fn commit(&mut self, obs: &Observation, phase_flagged: bool) {
        self.motion.apply(obs);
        self.combat.apply(obs);
        if obs.kind.has_position() && !phase_flagged && obs.position.is_finite() {
            self.motion.last_safe_position = Some(obs.position);
        }
        self.observations += 1;
    }

    /// Replaces the detector set. Test hook for fault injection.
    #[cfg(test)]
    pub(crate) fn push_detector(&mut self, detector: Box<dyn Detector>) {
        self.detectors.push(detector);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_history_tracks_air_and_ground() {
        let mut motion = MotionHistory::default();
        let airborne = Observation::builder(1, 0)
            .moved(Vec3::new(0.0, 64.0, 0.0), Vec3::new(0.0, 64.4, 0.0))
            .on_ground(false)
            .build();
        motion.apply(&airborne);
        motion.apply(&Observation { sequence: 2, timestamp_ms: 50, ..airborne.clone() });
        assert_eq!(motion.airborne_ticks, 2);
        assert_eq!(motion.ground_ticks, 0);
        assert_eq!(motion.last_interval_ms, Some(50));
        assert!(!motion.last_client_on_ground);
        assert!((motion.last_delta.y - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_rotation_only_keeps_position() {
        let mut motion = MotionHistory::default();
        motion.apply(&Observation::builder(1, 0).at(Vec3::new(1.0, 64.0, 1.0)).build());
        let look = Observation::builder(2, 50)
            .kind(ObservationKind::Rotation)
            .rotation(90.0, 10.0)
            .build();
        motion.apply(&look);
        assert_eq!(motion.last_position, Some(Vec3::new(1.0, 64.0, 1.0)));
        assert_eq!(motion.last_yaw, 90.0);
    }

    #[test]
    fn test_position_less_packets_keep_velocity() {
        let mut motion = MotionHistory::default();
        let fall = Observation::builder(1, 0)
            .moved(Vec3::new(0.0, 70.0, 0.0), Vec3::new(0.0, 69.92, 0.0))
            .on_ground(false)
            .build();
        motion.apply(&fall);
        let dy = motion.last_delta.y;
        motion.apply(&Observation::builder(2, 25).kind(ObservationKind::Flying).on_ground(false).build());
        motion.apply(&Observation::builder(3, 50).kind(ObservationKind::Rotation).on_ground(false).build());
        assert!((motion.last_delta.y - dy).abs() < 1e-12);
        assert_eq!(motion.movement_ticks, 3);
    }

    #[test]
    fn test_combat_log_transitions() {
        let mut combat = CombatLog::default();
        combat.apply(&Observation::builder(1, 100).kind(ObservationKind::Swing).build());
        combat.apply(
            &Observation::builder(2, 120)
                .kind(ObservationKind::Attack { target: 5 })
                .sprinting(true)
                .build(),
        );
        assert_eq!(combat.last_swing_ms, Some(100));
        assert_eq!(combat.last_attack_ms, Some(120));
        assert!(combat.last_attack_sprinting);

        combat.apply(&Observation::builder(3, 200).kind(ObservationKind::Death).alive(false).build());
        assert!(!combat.alive);
        assert_eq!(combat.died_at_ms, Some(200));

        combat.apply(&Observation::builder(4, 900).kind(ObservationKind::Respawn).build());
        assert!(combat.alive);
        assert_eq!(combat.respawned_at_ms, Some(900));
    }

    #[test]
    fn test_ping_estimator_smooths() {
        let mut ping = PingEstimator::new(0.5);
        assert_eq!(ping.estimate(), 0.0);
        assert_eq!(ping.observe(100), 100.0);
        assert_eq!(ping.observe(200), 150.0);
    }

    #[test]
    fn test_sequence_guard() {
        let mut state = PlayerState::new(PlayerId(1), 0, &EngineConfig::default());
        assert!(state.accept_sequence(1));
        assert!(!state.accept_sequence(1));
        assert!(!state.accept_sequence(0));
        assert!(state.accept_sequence(5));
        state.inherit(Some(10), 2_000);
        assert!(!state.accept_sequence(7));
        assert!(state.is_stale(1_500));
        assert!(!state.is_stale(2_001));
    }

    #[test]
    fn test_first_session_has_no_stale_floor() {
        let state = PlayerState::new(PlayerId(1), 1_040, &EngineConfig::default());
        assert!(!state.is_stale(1_010));
    }
}

//! # Detection Engine
//!
//! Owns every player's [`PlayerState`] and routes observations through it.
//!
//! ```text
//! on_observation(id, obs)
//!   │
//!   ├─ players.get(id)            absent ─────────────► Ignored
//!   ├─ lock state                 retired ────────────► Ignored
//!   ├─ sequence / timestamp guard duplicate or stale ─► Ignored
//!   ├─ automatic exemptions, ping, tolerance
//!   ├─ run every detector         (panics isolated)
//!   ├─ commit history
//!   └─ findings ──► ledger ──► flags ──► outbox
//! ```
//!
//! ## Concurrency
//!
//! Players live in a sharded [`DashMap`], each behind its own mutex. Calls
//! for different players never contend; calls for one player serialize on
//! its mutex. The map guard is released before the player lock is taken.
//!
//! ## Rejoin guard
//!
//! Leaving records a tombstone with the leave time and last sequence. A
//! rejoin inside `tombstone_ttl_ms` inherits both: late packets from the
//! previous session are dropped as duplicates, or as stale when stamped at
//! or before the leave. A first join has no floor, so packets stamped
//! before the join was processed still count.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use warden_shared::PlayerId;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::detector::components::Tolerance;
use crate::detector::{DetectorId, Finding, PhysicsModels};
use crate::environment::EnvironmentOracle;
use crate::error::ConfigError;
use crate::exemption::ExemptionReason;
use crate::observation::{Observation, ObservationKind};
use crate::outbox::{OutboundEvent, Outbox, ViolationRecord};
use crate::player::PlayerState;
use crate::violation::FlagEvent;

/// Why an observation was not processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No session and no record of one.
    UnknownPlayer,
    /// The player has left.
    AfterLeave,
    /// Sequence at or below one already processed.
    Duplicate,
    /// Stamped at or before the previous session's leave.
    Stale,
}

/// Result of [`Engine::on_observation`].
#[derive(Clone, Debug)]
pub enum ObservationOutcome {
    /// Every enabled detector ran.
    Processed {
        /// Findings, in detector registration order.
        findings: Vec<Finding>,
        /// Flag events raised by those findings.
        flags: Vec<FlagEvent>,
    },
    /// The observation was dropped.
    Ignored(IgnoreReason),
}

impl ObservationOutcome {
    /// Findings produced, empty when ignored.
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        match self {
            Self::Processed { findings, .. } => findings,
            Self::Ignored(_) => &[],
        }
    }

    /// Flags raised, empty when ignored.
    #[must_use]
    pub fn flags(&self) -> &[FlagEvent] {
        match self {
            Self::Processed { flags, .. } => flags,
            Self::Ignored(_) => &[],
        }
    }

    /// Why the observation was dropped, if it was.
    #[must_use]
    pub fn ignored(&self) -> Option<IgnoreReason> {
        match self {
            Self::Processed { .. } => None,
            Self::Ignored(reason) => Some(*reason),
        }
    }
}

/// Snapshot of engine counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Players currently tracked.
    pub players: usize,
    /// Observations that reached the detectors.
    pub processed: u64,
    /// Observations dropped before the detectors.
    pub ignored: u64,
    /// Findings produced.
    pub findings: u64,
    /// Flag events raised.
    pub flags: u64,
    /// Detector errors and panics isolated.
    pub detector_failures: u64,
    /// Outbox events dropped on saturation.
    pub outbox_dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    ignored: AtomicU64,
    findings: AtomicU64,
    flags: AtomicU64,
    detector_failures: AtomicU64,
}

#[derive(Clone, Copy, Debug)]
struct Tombstone {
    left_at_ms: u64,
    last_sequence: Option<u64>,
}

/// The detection engine.
pub struct Engine {
    config: Arc<EngineConfig>,
    physics: PhysicsModels,
    players: DashMap<PlayerId, Arc<Mutex<PlayerState>>>,
    tombstones: DashMap<PlayerId, Tombstone>,
    environment: Arc<dyn EnvironmentOracle>,
    clock: Arc<dyn Clock>,
    outbox: Outbox,
    counters: Counters,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("players", &self.players.len())
            .field("tombstones", &self.tombstones.len())
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine after validating `config`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] or [`ConfigError::Detector`] when the
    /// configuration is out of range.
    pub fn new(
        config: EngineConfig,
        environment: Arc<dyn EnvironmentOracle>,
        clock: Arc<dyn Clock>,
        outbox: Outbox,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            physics: config.physics(),
            config: Arc::new(config),
            players: DashMap::new(),
            tombstones: DashMap::new(),
            environment,
            clock,
            outbox,
            counters: Counters::default(),
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Clock used for join times and exemption marks.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Starts a session at the current clock time. Returns `false` if one is
    /// already active.
    pub fn on_player_join(&self, id: PlayerId) -> bool {
        self.on_player_join_at(id, self.clock.now_ms())
    }

    /// Starts a session requested at `at_ms`. Queued callers pass the time
    /// the join was requested, not the time it was dequeued.
    pub fn on_player_join_at(&self, id: PlayerId, at_ms: u64) -> bool {
        self.prune_tombstones(self.clock.now_ms());
        if self.players.contains_key(&id) {
            debug!(player = %id, "Duplicate join ignored");
            return false;
        }

        let mut state = PlayerState::new(id, at_ms, &self.config);
        if let Some((_, tombstone)) = self.tombstones.remove(&id) {
            state.inherit(tombstone.last_sequence, tombstone.left_at_ms);
        }
        state
            .exemptions
            .mark(ExemptionReason::Join, at_ms, self.config.exemptions.join_ms);

        self.players.insert(id, Arc::new(Mutex::new(state)));
        info!(player = %id, at_ms, "Player joined");
        true
    }

    /// Ends a session, flushing final levels. Returns `false` if none was
    /// active.
    pub fn on_player_leave(&self, id: PlayerId) -> bool {
        let Some((_, entry)) = self.players.remove(&id) else {
            return false;
        };
        let now = self.clock.now_ms();
        let mut state = entry.lock();
        state.retire();
        let levels = state.ledger.snapshot();
        self.tombstones.insert(
            id,
            Tombstone {
                left_at_ms: now,
                last_sequence: state.last_sequence(),
            },
        );
        info!(
            player = %id,
            observations = state.observations(),
            flagged = levels.len(),
            "Player left"
        );
        drop(state);
        self.outbox.send(OutboundEvent::Flush { player: id, levels });
        self.prune_tombstones(now);
        true
    }

    /// Runs every enabled detector of `id` on `obs`.
    pub fn on_observation(&self, id: PlayerId, obs: Observation) -> ObservationOutcome {
        let Some(entry) = self.players.get(&id).map(|e| Arc::clone(e.value())) else {
            let reason = if self.tombstones.contains_key(&id) {
                IgnoreReason::AfterLeave
            } else {
                IgnoreReason::UnknownPlayer
            };
            return self.ignore(id, reason);
        };
        let mut state = entry.lock();
        if state.is_retired() {
            return self.ignore(id, IgnoreReason::AfterLeave);
        }
        if state.is_stale(obs.timestamp_ms) {
            return self.ignore(id, IgnoreReason::Stale);
        }
        if !state.accept_sequence(obs.sequence) {
            return self.ignore(id, IgnoreReason::Duplicate);
        }

        let now = obs.timestamp_ms;
        let durations = &self.config.exemptions;
        match obs.kind {
            ObservationKind::Respawn => {
                state
                    .exemptions
                    .mark(ExemptionReason::Respawn, now, durations.respawn_ms);
            }
            ObservationKind::Teleport => {
                state
                    .exemptions
                    .mark(ExemptionReason::Teleport, now, durations.teleport_ms);
            }
            _ => {}
        }

        let ping = state.ping.observe(obs.ping_ms);
        let tolerance_config = &self.config.tolerance;
        let recent = state
            .exemptions
            .recently_exempt(now, tolerance_config.recent_cause_window_ms);
        let tolerance = Tolerance::compute(tolerance_config, ping, obs.server_tps, recent);

        let source = Arc::new(obs);
        let run = state.run_detectors(&source, tolerance, self.environment.as_ref(), &self.physics);
        let phase_flagged = run.findings.iter().any(|f| f.detector == DetectorId::Phase);
        state.commit(&source, phase_flagged);

        let mut flags = Vec::new();
        for finding in &run.findings {
            debug!(player = %id, detector = %finding.detector, evidence = %finding.evidence, "Finding");
            self.outbox
                .send(OutboundEvent::Finding(ViolationRecord::from_finding(id, finding)));
            if let Some(flag) = state.ledger.record_finding(finding) {
                warn!(
                    player = %id,
                    detector = %flag.detector,
                    score = flag.score,
                    count = flag.flag_count,
                    evidence = %flag.evidence,
                    "Player flagged"
                );
                self.outbox.send(OutboundEvent::Flag(flag.clone()));
                if flag.punish {
                    self.outbox.send(OutboundEvent::Punish(flag.clone()));
                }
                flags.push(flag);
            }
        }
        drop(state);

        let c = &self.counters;
        c.processed.fetch_add(1, Ordering::Relaxed);
        c.findings.fetch_add(run.findings.len() as u64, Ordering::Relaxed);
        c.flags.fetch_add(flags.len() as u64, Ordering::Relaxed);
        c.detector_failures
            .fetch_add(u64::from(run.failures), Ordering::Relaxed);

        ObservationOutcome::Processed {
            findings: run.findings,
            flags,
        }
    }

    fn ignore(&self, id: PlayerId, reason: IgnoreReason) -> ObservationOutcome {
        self.counters.ignored.fetch_add(1, Ordering::Relaxed);
        debug!(player = %id, ?reason, "Observation ignored");
        ObservationOutcome::Ignored(reason)
    }

    fn prune_tombstones(&self, now: u64) {
        let ttl = self.config.tombstone_ttl_ms;
        self.tombstones
            .retain(|_, t| now.saturating_sub(t.left_at_ms) < ttl);
    }

    fn player(&self, id: PlayerId) -> Option<Arc<Mutex<PlayerState>>> {
        self.players.get(&id).map(|e| Arc::clone(e.value()))
    }

    /// Runs `f` on the state of `id`, if present.
    pub fn with_player<R>(&self, id: PlayerId, f: impl FnOnce(&PlayerState) -> R) -> Option<R> {
        let entry = self.player(id)?;
        let state = entry.lock();
        Some(f(&state))
    }

    /// Current score of `detector` for `id`.
    #[must_use]
    pub fn get_violation_level(&self, id: PlayerId, detector: DetectorId) -> Option<f64> {
        self.with_player(id, |state| state.ledger.level(detector))
    }

    /// Overrides a score, clamped to be non-negative. Returns `false` for an
    /// unknown player.
    pub fn set_violation_level(&self, id: PlayerId, detector: DetectorId, value: f64) -> bool {
        let Some(entry) = self.player(id) else {
            return false;
        };
        entry.lock().ledger.set_level(detector, value);
        true
    }

    /// Whether any exemption of `id` is active now.
    #[must_use]
    pub fn is_exempt(&self, id: PlayerId) -> bool {
        let now = self.clock.now_ms();
        self.with_player(id, |state| state.exemptions.is_exempt(now))
            .unwrap_or(false)
    }

    /// Whether any of `reasons` is active for `id` now.
    #[must_use]
    pub fn is_exempt_for(&self, id: PlayerId, reasons: &[ExemptionReason]) -> bool {
        let now = self.clock.now_ms();
        self.with_player(id, |state| state.exemptions.is_exempt_for(now, reasons))
            .unwrap_or(false)
    }

    /// Opens or extends an exemption window for `id`. Returns `false` for an
    /// unknown player.
    pub fn mark_exception(&self, id: PlayerId, reason: ExemptionReason, duration_ms: u64) -> bool {
        let Some(entry) = self.player(id) else {
            return false;
        };
        let now = self.clock.now_ms();
        let mut state = entry.lock();
        state.exemptions.mark(reason, now, duration_ms);
        let remaining_ms = state.exemptions.remaining(reason, now).unwrap_or(0);
        debug!(player = %id, %reason, duration_ms, remaining_ms, "Exemption marked");
        true
    }

    /// Decays every player's ledger by one step.
    pub fn decay_all(&self) {
        let entries: Vec<_> = self.players.iter().map(|e| Arc::clone(e.value())).collect();
        for entry in entries {
            entry.lock().ledger.decay_all();
        }
    }

    /// Players currently tracked.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Whether `id` has an active session.
    #[must_use]
    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let c = &self.counters;
        EngineStats {
            players: self.players.len(),
            processed: c.processed.load(Ordering::Relaxed),
            ignored: c.ignored.load(Ordering::Relaxed),
            findings: c.findings.load(Ordering::Relaxed),
            flags: c.flags.load(Ordering::Relaxed),
            detector_failures: c.detector_failures.load(Ordering::Relaxed),
            outbox_dropped: self.outbox.stats().dropped.load(Ordering::Relaxed),
        }
    }
}

//! # Trace Replay
//!
//! A trace is a TOML file recording one session of server input: joins,
//! observations, exemptions, leaves and decay ticks, plus the world they
//! happened in. Replaying it drives a fresh [`Engine`] on a
//! [`ManualClock`] so results are identical on every run.
//!
//! ```toml
//! [world]
//! floor_y = 64
//! blocks = [{ x = 3, y = 64, z = 0, class = "solid" }]
//!
//! [[events]]
//! type = "join"
//! at_ms = 0
//! player = 1
//!
//! [[events]]
//! type = "observe"
//! player = 1
//! observation = { sequence = 1, timestamp_ms = 10000, position = { x = 0.5, y = 70.0, z = 0.5 }, client_on_ground = false }
//! ```
//!
//! Observations record positions only. The replay derives each delta from
//! the player's previous position, as a live observation source would.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use warden_shared::{BlockClass, BlockPos, PlayerId, Vec3};

use crate::clock::{Clock, ManualClock};
use crate::config::EngineConfig;
use crate::detector::DetectorId;
use crate::engine::{Engine, EngineStats, ObservationOutcome};
use crate::environment::VoxelGrid;
use crate::error::TraceError;
use crate::exemption::ExemptionReason;
use crate::observation::{Observation, ObservationKind};
use crate::outbox::{Outbox, ViolationRecord};
use crate::violation::FlagEvent;

/// One block placed into the replay world.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceBlock {
    /// Block x.
    pub x: i32,
    /// Block y.
    pub y: i32,
    /// Block z.
    pub z: i32,
    /// What the block is.
    pub class: BlockClass,
}

/// World the trace was recorded in.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceWorld {
    /// Everything below this height is solid.
    pub floor_y: Option<i32>,
    /// Individual blocks.
    pub blocks: Vec<TraceBlock>,
}

impl TraceWorld {
    /// Builds the voxel grid.
    #[must_use]
    pub fn to_grid(&self) -> VoxelGrid {
        let mut grid = match self.floor_y {
            Some(y) => VoxelGrid::flat(y),
            None => VoxelGrid::new(),
        };
        for block in &self.blocks {
            grid.set(BlockPos::new(block.x, block.y, block.z), block.class);
        }
        grid
    }
}

/// One recorded input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Player joined.
    Join {
        /// Clock time.
        at_ms: u64,
        /// Player id.
        player: u64,
    },
    /// Player left.
    Leave {
        /// Clock time.
        at_ms: u64,
        /// Player id.
        player: u64,
    },
    /// Exemption trigger.
    Exempt {
        /// Clock time.
        at_ms: u64,
        /// Player id.
        player: u64,
        /// Trigger.
        reason: ExemptionReason,
        /// Window length; the configured default when absent.
        #[serde(default)]
        duration_ms: Option<u64>,
    },
    /// Inbound message. The clock advances to its timestamp.
    Observe {
        /// Player id.
        player: u64,
        /// The message.
        observation: Observation,
    },
    /// Periodic ledger decay.
    Decay {
        /// Clock time.
        at_ms: u64,
    },
}

/// A recorded session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trace {
    /// Engine configuration; defaults when absent.
    pub config: Option<EngineConfig>,
    /// Replay world.
    pub world: TraceWorld,
    /// Inputs in arrival order.
    pub events: Vec<TraceEvent>,
}

/// Per-player replay summary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlayerReport {
    /// Observations processed.
    pub processed: u64,
    /// Observations dropped by the engine.
    pub ignored: u64,
    /// Findings per detector.
    pub findings: BTreeMap<DetectorId, u64>,
    /// Non-zero levels at leave, or at the end of the trace.
    pub final_levels: Vec<(DetectorId, f64)>,
}

/// Replay result.
#[derive(Clone, Debug, Default)]
pub struct TraceReport {
    /// Events replayed.
    pub events: usize,
    /// Per-player summaries.
    pub players: BTreeMap<PlayerId, PlayerReport>,
    /// Every finding, in order.
    pub findings: Vec<ViolationRecord>,
    /// Every flag event, in order.
    pub flags: Vec<FlagEvent>,
    /// Engine counters at the end of the replay.
    pub stats: EngineStats,
}

impl TraceReport {
    /// Findings produced by `detector`.
    #[must_use]
    pub fn findings_for(&self, detector: DetectorId) -> usize {
        self.findings.iter().filter(|r| r.detector == detector).count()
    }
}

impl Trace {
    /// Parses a trace.
    ///
    /// # Errors
    ///
    /// [`TraceError::Parse`] on malformed TOML.
    pub fn from_toml_str(source: &str) -> Result<Self, TraceError> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a trace file.
    ///
    /// # Errors
    ///
    /// [`TraceError::Io`] or [`TraceError::Parse`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| TraceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Replays every event through a fresh engine.
    ///
    /// # Errors
    ///
    /// [`TraceError::Config`] when the embedded configuration is invalid.
    pub fn replay(&self) -> Result<TraceReport, TraceError> {
        let config = self.config.clone().unwrap_or_default();
        let durations = config.exemptions;
        let clock = Arc::new(ManualClock::new(0));
        let engine = Engine::new(
            config,
            Arc::new(self.world.to_grid()),
            Arc::clone(&clock) as Arc<dyn Clock>,
            Outbox::disconnected(),
        )?;

        let mut report = TraceReport {
            events: self.events.len(),
            ..TraceReport::default()
        };
        let mut last_positions: HashMap<PlayerId, Vec3> = HashMap::new();

        for event in &self.events {
            match event {
                TraceEvent::Join { at_ms, player } => {
                    clock.set(*at_ms);
                    let id = PlayerId(*player);
                    engine.on_player_join(id);
                    last_positions.remove(&id);
                    report.players.entry(id).or_default();
                }
                TraceEvent::Leave { at_ms, player } => {
                    clock.set(*at_ms);
                    let id = PlayerId(*player);
                    if let Some(levels) = engine.with_player(id, |s| s.ledger.snapshot()) {
                        report.players.entry(id).or_default().final_levels = levels;
                    }
                    engine.on_player_leave(id);
                }
                TraceEvent::Exempt {
                    at_ms,
                    player,
                    reason,
                    duration_ms,
                } => {
                    clock.set(*at_ms);
                    let duration = duration_ms.unwrap_or_else(|| durations.duration_for(*reason));
                    engine.mark_exception(PlayerId(*player), *reason, duration);
                }
                TraceEvent::Observe { player, observation } => {
                    let id = PlayerId(*player);
                    clock.set(observation.timestamp_ms);
                    let obs = derive_delta(&mut last_positions, id, observation.clone());
                    let outcome = engine.on_observation(id, obs);
                    record_outcome(&mut report, id, &outcome);
                }
                TraceEvent::Decay { at_ms } => {
                    clock.set(*at_ms);
                    engine.decay_all();
                }
            }
        }

        for (id, player) in &mut report.players {
            if let Some(levels) = engine.with_player(*id, |s| s.ledger.snapshot()) {
                player.final_levels = levels;
            }
        }
        report.stats = engine.stats();
        info!(
            events = report.events,
            findings = report.findings.len(),
            flags = report.flags.len(),
            "Trace replayed"
        );
        Ok(report)
    }
}

fn derive_delta(last: &mut HashMap<PlayerId, Vec3>, id: PlayerId, mut obs: Observation) -> Observation {
    if obs.kind == ObservationKind::Teleport {
        last.insert(id, obs.position);
        return obs;
    }
    if !obs.kind.has_position() {
        return obs;
    }
    if let Some(previous) = last.insert(id, obs.position) {
        obs.delta = obs.position - previous;
    }
    obs
}

fn record_outcome(report: &mut TraceReport, id: PlayerId, outcome: &ObservationOutcome) {
    let player = report.players.entry(id).or_default();
    if outcome.ignored().is_some() {
        player.ignored += 1;
        return;
    }
    player.processed += 1;
    for finding in outcome.findings() {
        *player.findings.entry(finding.detector).or_default() += 1;
        report.findings.push(ViolationRecord::from_finding(id, finding));
    }
    report.flags.extend(outcome.flags().iter().cloned());
}

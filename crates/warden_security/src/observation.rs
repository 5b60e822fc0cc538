//! # Observations
//!
//! One normalized client event with the server-side context needed to judge
//! it. Observations are immutable once built and shared by `Arc` between the
//! findings that cite them.

use serde::{Deserialize, Serialize};
use warden_shared::{EnvironmentFlags, StatusEffects, Vec3};

/// Kind of client event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObservationKind {
    /// Position and rotation update.
    #[default]
    Movement,
    /// Position-only update.
    Position,
    /// Rotation-only update.
    Rotation,
    /// Ground-state-only update.
    Flying,
    /// Attack on an entity.
    Attack {
        /// Target entity id.
        target: u64,
    },
    /// Arm swing.
    Swing,
    /// Block or entity interaction.
    Interact,
    /// Server reports the player died.
    Death,
    /// Server reports the player respawned.
    Respawn,
    /// Server-initiated teleport was applied.
    Teleport,
    /// Any other packet.
    Other {
        /// Raw packet id.
        packet_id: u32,
    },
}

impl ObservationKind {
    /// Movement-class packets, the ones the client sends once per tick.
    #[must_use]
    pub const fn is_movement_class(self) -> bool {
        matches!(self, Self::Movement | Self::Position | Self::Rotation | Self::Flying)
    }

    /// Whether the observation carries a new position.
    #[must_use]
    pub const fn has_position(self) -> bool {
        matches!(self, Self::Movement | Self::Position)
    }

    /// Whether the observation carries a new rotation.
    #[must_use]
    pub const fn has_rotation(self) -> bool {
        matches!(self, Self::Movement | Self::Rotation)
    }

    /// Attacks, swings and interactions.
    #[must_use]
    pub const fn is_action(self) -> bool {
        matches!(self, Self::Attack { .. } | Self::Swing | Self::Interact)
    }
}

/// A single normalized client event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Observation {
    /// Per-player monotonically increasing sequence number.
    pub sequence: u64,
    /// Arrival time in milliseconds, engine clock.
    pub timestamp_ms: u64,
    /// Event kind.
    pub kind: ObservationKind,
    /// Position after the event.
    pub position: Vec3,
    /// Displacement since the previous position.
    pub delta: Vec3,
    /// Ground flag claimed by the client.
    pub client_on_ground: bool,
    /// Server-computed ground state, when the source provides one.
    pub server_on_ground: Option<bool>,
    /// Environment around the player.
    pub environment: EnvironmentFlags,
    /// Active status effects.
    pub effects: StatusEffects,
    /// Yaw in degrees.
    pub yaw: f64,
    /// Pitch in degrees.
    pub pitch: f64,
    /// Client sprint state.
    pub sprinting: bool,
    /// Server alive state.
    pub alive: bool,
    /// Latest ping sample.
    pub ping_ms: u32,
    /// Server ticks per second at arrival.
    pub server_tps: f64,
}

impl Default for Observation {
    fn default() -> Self {
        Self {
            sequence: 0,
            timestamp_ms: 0,
            kind: ObservationKind::Movement,
            position: Vec3::ZERO,
            delta: Vec3::ZERO,
            client_on_ground: true,
            server_on_ground: None,
            environment: EnvironmentFlags::default(),
            effects: StatusEffects::NONE,
            yaw: 0.0,
            pitch: 0.0,
            sprinting: false,
            alive: true,
            ping_ms: 0,
            server_tps: 20.0,
        }
    }
}

impl Observation {
    /// Starts building an observation.
    #[must_use]
    pub fn builder(sequence: u64, timestamp_ms: u64) -> ObservationBuilder {
        ObservationBuilder {
            inner: Self {
                sequence,
                timestamp_ms,
                ..Self::default()
            },
        }
    }

    /// Checks the numeric fields a movement detector relies on.
    ///
    /// # Errors
    ///
    /// Returns a description of the first non-finite field.
    pub fn validate_motion(&self) -> Result<(), String> {
        if !self.position.is_finite() {
            return Err(format!("non-finite position {:?}", self.position));
        }
        if !self.delta.is_finite() {
            return Err(format!("non-finite delta {:?}", self.delta));
        }
        if !self.yaw.is_finite() || !self.pitch.is_finite() {
            return Err(format!("non-finite rotation ({}, {})", self.yaw, self.pitch));
        }
        Ok(())
    }
}

/// Fluent constructor for [`Observation`].
#[derive(Clone, Debug)]
#[must_use]
pub struct ObservationBuilder {
    inner: Observation,
}

impl ObservationBuilder {
    /// Sets the kind.
    pub fn kind(mut self, kind: ObservationKind) -> Self {
        self.inner.kind = kind;
        self
    }

    /// Moves from `from` to `to`, deriving the delta.
    pub fn moved(mut self, from: Vec3, to: Vec3) -> Self {
        self.inner.position = to;
        self.inner.delta = to - from;
        self
    }

    /// Places the player at `position` without displacement.
    pub fn at(mut self, position: Vec3) -> Self {
        self.inner.position = position;
        self.inner.delta = Vec3::ZERO;
        self
    }

    /// Overrides the delta.
    pub fn delta(mut self, delta: Vec3) -> Self {
        self.inner.delta = delta;
        self
    }

    /// Client ground claim.
    pub fn on_ground(mut self, on_ground: bool) -> Self {
        self.inner.client_on_ground = on_ground;
        self
    }

    /// Server ground state.
    pub fn server_on_ground(mut self, on_ground: bool) -> Self {
        self.inner.server_on_ground = Some(on_ground);
        self
    }

    /// Environment flags.
    pub fn environment(mut self, environment: EnvironmentFlags) -> Self {
        self.inner.environment = environment;
        self
    }

    /// Status effects.
    pub fn effects(mut self, effects: StatusEffects) -> Self {
        self.inner.effects = effects;
        self
    }

    /// Rotation.
    pub fn rotation(mut self, yaw: f64, pitch: f64) -> Self {
        self.inner.yaw = yaw;
        self.inner.pitch = pitch;
        self
    }

    /// Sprint state.
    pub fn sprinting(mut self, sprinting: bool) -> Self {
        self.inner.sprinting = sprinting;
        self
    }

    /// Alive state.
    pub fn alive(mut self, alive: bool) -> Self {
        self.inner.alive = alive;
        self
    }

    /// Ping sample.
    pub fn ping(mut self, ping_ms: u32) -> Self {
        self.inner.ping_ms = ping_ms;
        self
    }

    /// Server TPS.
    pub fn server_tps(mut self, tps: f64) -> Self {
        self.inner.server_tps = tps;
        self
    }

    /// Finishes the observation.
    #[must_use]
    pub fn build(self) -> Observation {
        self.inner
    }
}

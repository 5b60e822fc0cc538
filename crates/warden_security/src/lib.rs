//! # WARDEN Security - The Watchtower
//!
//! Server-side cheat detection over per-player observation streams.
//!
//! ## Features
//!
//! - **Movement Detectors**: gravity, speed, trajectory, phase, ground spoof,
//!   air strafe, keep sprint
//! - **Combat Detectors**: swing timing, attack rate, attack pattern, dead
//!   action, sprint hit
//! - **Packet Timing**: speedup, slowdown and machine pacing
//! - **Violation Ledger**: debounced scores that flag, decay and punish
//! - **Exemptions**: time-windowed suppression for teleports, knockback,
//!   joins and respawns
//!
//! ## Architecture
//!
//! ```text
//!  SERVER                          WARDEN
//!     │                               │
//!     │─── Observation ──────────────►│ ObservationPool (pinned per player)
//!     │─── join / leave / exempt ────►│        │
//!     │                               │        ▼
//!     │                               │ ┌──────────────┐
//!     │                               │ │    Engine    │──► PlayerState
//!     │                               │ └──────────────┘      ├─ detectors
//!     │                               │        │              ├─ ledger
//!     │                               │        ▼              └─ exemptions
//!     │◄─── flags / punishments ──────│     Outbox
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod clock;
pub mod config;
pub mod detector;
pub mod engine;
pub mod environment;
pub mod error;
pub mod exemption;
pub mod observation;
pub mod outbox;
pub mod player;
pub mod pool;
pub mod trace;
pub mod violation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DetectorsConfig, EngineConfig, ExemptionDurations};
pub use detector::{Detector, DetectorCategory, DetectorContext, DetectorId, Finding};
pub use engine::{Engine, EngineStats, IgnoreReason, ObservationOutcome};
pub use environment::{EnvironmentOracle, OpenAir, VoxelGrid};
pub use error::{ConfigError, DetectorError, PoolError, SinkError, TraceError};
pub use exemption::{ExemptionReason, ExemptionWindows};
pub use observation::{Observation, ObservationBuilder, ObservationKind};
pub use outbox::{
    AlertBroadcaster, Collaborators, MemorySink, OutboundEvent, Outbox, OutboxWorker,
    PersistenceSink, PunishmentHandler, ViolationRecord,
};
pub use player::PlayerState;
pub use pool::ObservationPool;
pub use trace::{Trace, TraceReport};
pub use violation::{DetectorSettings, FlagEvent, ViolationLedger};

//! # WARDEN Shared
//!
//! Common value types used by the physics library and the detection engine.
//!
//! ## CRITICAL RULE
//!
//! This crate holds plain values only. Anything with rolling state belongs in
//! `warden_security`; anything that computes belongs in `warden_physics`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod constants;
pub mod effects;
pub mod environment;
pub mod ids;
pub mod math;

pub use constants::{HEALTHY_TPS, TICK_INTERVAL_MS, TICK_RATE};
pub use effects::StatusEffects;
pub use environment::{BlockClass, EnvironmentFlags, SurfaceKind};
pub use ids::{BlockPos, PlayerId};
pub use math::{Vec2, Vec3};

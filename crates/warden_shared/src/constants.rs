//! # Timing Constants
//!
//! Nominal server cadence. Physics constants are NOT here: they are tunable
//! and live on the models in `warden_physics`.

// =============================================================================
// TICK CONFIGURATION
// =============================================================================

/// Nominal server tick rate (updates per second).
pub const TICK_RATE: f64 = 20.0;

/// Nominal interval between movement-class messages (milliseconds).
pub const TICK_INTERVAL_MS: f64 = 1000.0 / TICK_RATE;

/// Server tick rate at or above which the server is considered healthy.
pub const HEALTHY_TPS: f64 = 19.0;

//! # Security Error Types
//!
//! Nothing in here is fatal to the engine. Detector errors are caught per
//! detector, sink errors stay inside the outbox thread, and config errors
//! only surface at startup.

use thiserror::Error;
use warden_physics::FitError;

/// Errors raised by a single detector while consuming one observation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    /// The observation is missing data or carries non-finite values.
    #[error("malformed observation: {0}")]
    MalformedObservation(String),

    /// A regression or statistic could not be computed.
    #[error("degenerate input: {0}")]
    Degenerate(#[from] FitError),

    /// Internal invariant broken; the detector will be reset.
    #[error("detector fault: {0}")]
    Fault(String),
}

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TOML could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A single setting is out of range.
    #[error("{field} {reason}")]
    OutOfRange {
        /// Setting name.
        field: &'static str,
        /// Accepted range and the rejected value.
        reason: String,
    },

    /// A detector's settings are out of range.
    #[error("invalid configuration: detectors.{detector}: {source}")]
    Detector {
        /// Detector name.
        detector: &'static str,
        /// The offending setting.
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    pub(crate) fn out_of_range(field: &'static str, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            field,
            reason: reason.into(),
        }
    }
}

/// Delivery failure reported by an external collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The collaborator is temporarily unavailable.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// The collaborator rejected the record.
    #[error("record rejected: {0}")]
    Rejected(String),
}

/// Errors submitting work to the worker pool.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// The pool has been shut down.
    #[error("worker pool is shut down")]
    Closed,
}

/// Errors loading a recorded trace.
#[derive(Error, Debug)]
pub enum TraceError {
    /// File could not be read.
    #[error("failed to read trace {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TOML could not be parsed.
    #[error("failed to parse trace: {0}")]
    Parse(#[from] toml::de::Error),

    /// Engine configuration embedded in the trace is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

//! # Physics Error Types

use thiserror::Error;

/// Reasons a regression could not be computed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FitError {
    /// Not enough samples to determine the curve.
    #[error("too few points: need {needed}, got {got}")]
    TooFewPoints {
        /// Minimum sample count.
        needed: usize,
        /// Samples supplied.
        got: usize,
    },

    /// X and Y series differ in length.
    #[error("length mismatch: {x} x-values, {y} y-values")]
    LengthMismatch {
        /// X length.
        x: usize,
        /// Y length.
        y: usize,
    },

    /// Input contained NaN or infinity.
    #[error("non-finite input value")]
    NonFinite,

    /// Normal equations are singular (e.g. all x identical).
    #[error("singular system: x-values do not span a quadratic")]
    Singular,
}

//! # WARDEN Physics - The Oracle of Plausibility
//!
//! Pure math answering one question for the detectors: *could a legitimate
//! client have produced this?*
//!
//! ## Modules
//!
//! - **gravity**: next-tick vertical prediction, jump velocity, fall simulation
//! - **speed**: multiplicative composition of horizontal speed limits
//! - **stats**: mean/variance, coefficient of variation, regularity score
//! - **regression**: least-squares quadratic fit for airborne trajectories
//! - **geometry**: angles between vectors, yaw wrapping, path sampling
//!
//! Nothing here holds state. Every function can be tested in isolation.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod geometry;
pub mod gravity;
pub mod regression;
pub mod speed;
pub mod stats;

pub use error::FitError;
pub use geometry::{angle_between, sample_path, wrap_degrees, yaw_delta, yaw_to_direction};
pub use gravity::GravityModel;
pub use regression::{quadratic_fit, QuadraticFit};
pub use speed::{SpeedModel, SurfaceModifiers};
pub use stats::{coefficient_of_variation, mean, regularity_score, std_dev, variance};

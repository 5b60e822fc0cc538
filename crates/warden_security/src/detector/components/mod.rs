//! Building blocks shared by detectors.
//!
//! Detectors compose these instead of inheriting behavior: a debounce
//! buffer for hysteresis, a bounded sample window, and the per-observation
//! tolerance scale.

pub mod debounce;
pub mod tolerance;
pub mod window;

pub use debounce::{Debounce, DebounceConfig};
pub use tolerance::{Tolerance, ToleranceConfig};
pub use window::SampleWindow;

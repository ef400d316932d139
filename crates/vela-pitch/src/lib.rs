//! Autocorrelation pitch detection and granular pitch shifting (vocal
//! correction). One [`PitchEngine`] instance processes a mono signal;
//! stereo callers run one instance per channel.

pub mod detector;
pub mod engine;
pub mod scale;
pub mod shifter;

pub use detector::AcfDetector;
pub use engine::{PitchEngine, PitchFeedback, PitchSettings};
pub use scale::Scale;
pub use shifter::GranularShifter;

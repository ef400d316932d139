pub mod curve;
pub mod manager;
pub mod record;

pub use curve::{Breakpoint, LaneCurve, BREAKPOINT_COLLAPSE_SECONDS};
pub use manager::{AutomationFeedback, AutomationManager, ParameterSpec, BRIDGED_THROTTLE_SECONDS};
pub use record::{AutomationMode, Recorder};

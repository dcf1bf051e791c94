pub mod calibration;
pub mod counter;
pub mod drift;
pub mod phase;
pub mod score;
pub mod session;
pub mod side;
pub mod velocity;

pub use calibration::{CalibrationStatus, Calibrator};
pub use counter::{Effect, FrameOutput, RepCounter, RepEvent};
pub use drift::DriftWatchdog;
pub use phase::{PhaseMachine, Transition};
pub use score::{DepthQuality, FatigueLevel, RepScore, RepScorer};
pub use session::{Phase, SessionState};
pub use side::SideSelector;
pub use velocity::VelocityTracker;

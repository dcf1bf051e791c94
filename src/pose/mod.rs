pub mod joint;
pub mod keypoint;

pub use joint::{Joint, Side};
pub use keypoint::{Landmark, LandmarkIndex, Pose};

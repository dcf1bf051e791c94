use serde::{Deserialize, Serialize};

use super::keypoint::LandmarkIndex;

/// 体の左右
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// 左右を区別しない関節名。Side と組み合わせてランドマークを引く
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Joint {
    Shoulder,
    Elbow,
    Wrist,
    Hip,
    Knee,
    Ankle,
}

impl Joint {
    pub fn on(self, side: Side) -> LandmarkIndex {
        use LandmarkIndex::*;
        match (self, side) {
            (Joint::Shoulder, Side::Left) => LeftShoulder,
            (Joint::Shoulder, Side::Right) => RightShoulder,
            (Joint::Elbow, Side::Left) => LeftElbow,
            (Joint::Elbow, Side::Right) => RightElbow,
            (Joint::Wrist, Side::Left) => LeftWrist,
            (Joint::Wrist, Side::Right) => RightWrist,
            (Joint::Hip, Side::Left) => LeftHip,
            (Joint::Hip, Side::Right) => RightHip,
            (Joint::Knee, Side::Left) => LeftKnee,
            (Joint::Knee, Side::Right) => RightKnee,
            (Joint::Ankle, Side::Left) => LeftAnkle,
            (Joint::Ankle, Side::Right) => RightAnkle,
        }
    }
}

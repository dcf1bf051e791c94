use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// 33点ボディランドマークのインデックス (BlazePose 互換)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum LandmarkIndex {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl LandmarkIndex {
    pub const COUNT: usize = 33;
}

/// 単一ランドマーク
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// 正規化されたX座標 (0.0〜1.0)
    pub x: f32,
    /// 正規化されたY座標 (0.0〜1.0, 下向きが正)
    pub y: f32,
    /// 可視性スコア (0.0〜1.0)
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self { x, y, visibility }
    }

    /// 可視性が閾値を超えているか
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility > threshold
    }

    /// 2点間のユークリッド距離（正規化座標）
    pub fn distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.visibility.is_finite()
    }
}

impl Default for Landmark {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            visibility: 0.0,
        }
    }
}

impl From<[f32; 3]> for Landmark {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// 1フレーム分の33点姿勢
#[derive(Debug, Clone)]
pub struct Pose {
    pub landmarks: [Landmark; LandmarkIndex::COUNT],
}

impl Pose {
    pub fn new(landmarks: [Landmark; LandmarkIndex::COUNT]) -> Self {
        Self { landmarks }
    }

    /// 外部ソースから受け取ったランドマーク列を検証して Pose を作る
    ///
    /// 点数の不一致や NaN/inf は上流の契約違反としてエラーにする
    pub fn from_landmarks(landmarks: &[Landmark]) -> Result<Self, FrameError> {
        if landmarks.len() != LandmarkIndex::COUNT {
            return Err(FrameError::WrongLandmarkCount {
                expected: LandmarkIndex::COUNT,
                actual: landmarks.len(),
            });
        }
        if let Some(index) = landmarks.iter().position(|l| !l.is_finite()) {
            return Err(FrameError::NonFiniteLandmark { index });
        }
        let mut points = [Landmark::default(); LandmarkIndex::COUNT];
        points.copy_from_slice(landmarks);
        Ok(Self::new(points))
    }

    /// インデックスでランドマークを取得
    pub fn get(&self, index: LandmarkIndex) -> &Landmark {
        &self.landmarks[index as usize]
    }

    pub fn set(&mut self, index: LandmarkIndex, landmark: Landmark) {
        self.landmarks[index as usize] = landmark;
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            landmarks: [Landmark::default(); LandmarkIndex::COUNT],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_index_count() {
        assert_eq!(LandmarkIndex::COUNT, 33);
        assert_eq!(LandmarkIndex::RightFootIndex as usize, LandmarkIndex::COUNT - 1);
    }

    #[test]
    fn test_landmark_is_visible() {
        let lm = Landmark::new(0.5, 0.5, 0.7);
        assert!(lm.is_visible(0.5));
        assert!(!lm.is_visible(0.7));
    }

    #[test]
    fn test_landmark_distance() {
        let a = Landmark::new(0.0, 0.0, 1.0);
        let b = Landmark::new(0.3, 0.4, 1.0);
        assert!((a.distance(&b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_pose_get_set() {
        let mut pose = Pose::default();
        pose.set(LandmarkIndex::LeftHip, Landmark::new(0.4, 0.6, 0.9));
        let hip = pose.get(LandmarkIndex::LeftHip);
        assert_eq!(hip.x, 0.4);
        assert_eq!(hip.y, 0.6);
        assert_eq!(hip.visibility, 0.9);
    }

    #[test]
    fn test_from_landmarks_rejects_short_frame() {
        let landmarks = vec![Landmark::default(); 17];
        let err = Pose::from_landmarks(&landmarks).unwrap_err();
        assert_eq!(
            err,
            FrameError::WrongLandmarkCount {
                expected: 33,
                actual: 17
            }
        );
    }

    #[test]
    fn test_from_landmarks_rejects_nan() {
        let mut landmarks = vec![Landmark::new(0.5, 0.5, 1.0); LandmarkIndex::COUNT];
        landmarks[24].y = f32::NAN;
        let err = Pose::from_landmarks(&landmarks).unwrap_err();
        assert_eq!(err, FrameError::NonFiniteLandmark { index: 24 });
    }

    #[test]
    fn test_from_landmarks_copies_values() {
        let landmarks: Vec<Landmark> = (0..LandmarkIndex::COUNT)
            .map(|i| Landmark::new(i as f32 / 100.0, 0.5, 0.9))
            .collect();
        let pose = Pose::from_landmarks(&landmarks).unwrap();
        assert_eq!(pose.get(LandmarkIndex::RightKnee).x, 0.26);
    }
}

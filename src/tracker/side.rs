use crate::config::ExerciseProfile;
use crate::pose::{Joint, Pose, Side};

use super::session::{Phase, SessionState};

/// 左右どちらの関節を使うかの選択
///
/// 一度ロックした側は、見えなくなり、反対側が十分に見えていて、
/// かつ立位のときにだけ切り替える。レップ途中の切替は深さ計測を壊すので禁止
pub struct SideSelector {
    visibility_threshold: f32,
    flip_margin: f32,
    tracked: Joint,
    required: Vec<Joint>,
}

impl SideSelector {
    pub fn from_profile(profile: &ExerciseProfile) -> Self {
        Self {
            visibility_threshold: profile.visibility_threshold,
            flip_margin: profile.side_flip_margin,
            tracked: profile.tracked,
            required: profile.required_joints(),
        }
    }

    /// 必要な関節がすべて閾値を超えて見えているか
    pub fn is_side_valid(&self, pose: &Pose, side: Side) -> bool {
        self.required
            .iter()
            .all(|j| pose.get(j.on(side)).is_visible(self.visibility_threshold))
    }

    fn tracked_visibility(&self, pose: &Pose, side: Side) -> f32 {
        pose.get(self.tracked.on(side)).visibility
    }

    /// このフレームで使う側を返す。使えなければ None
    ///
    /// `locked_side` と `tracking_loss_frames` を更新する
    pub fn select(&self, pose: &Pose, state: &mut SessionState) -> Option<Side> {
        let left_ok = self.is_side_valid(pose, Side::Left);
        let right_ok = self.is_side_valid(pose, Side::Right);

        let selected = match state.locked_side {
            None => match (left_ok, right_ok) {
                (true, true) => {
                    // 同値なら左
                    if self.tracked_visibility(pose, Side::Right)
                        > self.tracked_visibility(pose, Side::Left)
                    {
                        Some(Side::Right)
                    } else {
                        Some(Side::Left)
                    }
                }
                (true, false) => Some(Side::Left),
                (false, true) => Some(Side::Right),
                (false, false) => None,
            },
            Some(current) => {
                let current_ok = if current == Side::Left { left_ok } else { right_ok };
                let other = current.opposite();
                let other_ok = if other == Side::Left { left_ok } else { right_ok };
                if current_ok {
                    Some(current)
                } else if other_ok
                    && state.phase == Phase::Standing
                    && self.tracked_visibility(pose, other) - self.tracked_visibility(pose, current)
                        > self.flip_margin
                {
                    log::debug!("side flip {:?} -> {:?}", current, other);
                    Some(other)
                } else {
                    None
                }
            }
        };

        match selected {
            Some(side) => {
                if state.locked_side.is_none() {
                    log::debug!("side locked: {:?}", side);
                }
                state.locked_side = Some(side);
                state.tracking_loss_frames = 0;
            }
            None => {
                state.tracking_loss_frames = state.tracking_loss_frames.saturating_add(1);
            }
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Landmark;

    fn squat_pose(left_vis: f32, right_vis: f32) -> Pose {
        let mut pose = Pose::default();
        for (side, vis) in [(Side::Left, left_vis), (Side::Right, right_vis)] {
            pose.set(Joint::Hip.on(side), Landmark::new(0.5, 0.5, vis));
            pose.set(Joint::Knee.on(side), Landmark::new(0.5, 0.7, vis));
        }
        pose
    }

    fn selector() -> SideSelector {
        SideSelector::from_profile(&ExerciseProfile::squat())
    }

    #[test]
    fn test_locks_more_visible_side() {
        let mut state = SessionState::new(5);
        let side = selector().select(&squat_pose(0.6, 0.9), &mut state);
        assert_eq!(side, Some(Side::Right));
        assert_eq!(state.locked_side, Some(Side::Right));
    }

    #[test]
    fn test_tie_prefers_left() {
        let mut state = SessionState::new(5);
        let side = selector().select(&squat_pose(0.8, 0.8), &mut state);
        assert_eq!(side, Some(Side::Left));
    }

    #[test]
    fn test_both_invisible_counts_loss() {
        let mut state = SessionState::new(5);
        let sel = selector();
        assert_eq!(sel.select(&squat_pose(0.1, 0.2), &mut state), None);
        assert_eq!(sel.select(&squat_pose(0.1, 0.2), &mut state), None);
        assert_eq!(state.tracking_loss_frames, 2);
        assert!(state.locked_side.is_none());
        sel.select(&squat_pose(0.9, 0.2), &mut state);
        assert_eq!(state.tracking_loss_frames, 0);
    }

    #[test]
    fn test_sticky_while_current_valid() {
        let mut state = SessionState::new(5);
        state.locked_side = Some(Side::Left);
        let side = selector().select(&squat_pose(0.55, 1.0), &mut state);
        assert_eq!(side, Some(Side::Left));
    }

    #[test]
    fn test_flips_when_current_lost_while_standing() {
        let mut state = SessionState::new(5);
        state.locked_side = Some(Side::Left);
        let side = selector().select(&squat_pose(0.3, 0.9), &mut state);
        assert_eq!(side, Some(Side::Right));
        assert_eq!(state.locked_side, Some(Side::Right));
    }

    #[test]
    fn test_no_flip_within_margin() {
        let mut state = SessionState::new(5);
        state.locked_side = Some(Side::Left);
        // 0.55 - 0.45 = 0.10 < 0.15
        let side = selector().select(&squat_pose(0.45, 0.55), &mut state);
        assert_eq!(side, None);
        assert_eq!(state.locked_side, Some(Side::Left));
        assert_eq!(state.tracking_loss_frames, 1);
    }

    #[test]
    fn test_no_flip_mid_rep() {
        let mut state = SessionState::new(5);
        state.locked_side = Some(Side::Left);
        state.phase = Phase::Descending;
        let side = selector().select(&squat_pose(0.1, 1.0), &mut state);
        assert_eq!(side, None);
        assert_eq!(state.locked_side, Some(Side::Left));
    }

    #[test]
    fn test_press_requires_shoulder_and_wrist() {
        let sel = SideSelector::from_profile(&ExerciseProfile::press());
        let mut pose = Pose::default();
        pose.set(Joint::Wrist.on(Side::Left), Landmark::new(0.5, 0.3, 0.9));
        pose.set(Joint::Elbow.on(Side::Left), Landmark::new(0.5, 0.4, 0.9));
        assert!(!sel.is_side_valid(&pose, Side::Left));
        pose.set(Joint::Shoulder.on(Side::Left), Landmark::new(0.5, 0.5, 0.9));
        assert!(sel.is_side_valid(&pose, Side::Left));
    }
}

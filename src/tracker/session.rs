use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

use crate::pose::Side;

use super::velocity::VelocityTracker;

/// レップの局面。常にどれか1つだけがアクティブ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Standing,
    Descending,
    Ascending,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Standing => "Standing",
            Phase::Descending => "Descending",
            Phase::Ascending => "Ascending",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// キャリブレーション中のサンプル
#[derive(Debug, Clone, Default)]
pub struct CalibrationBuffer {
    pub samples: Vec<f32>,
    /// 体節長の指数平滑値
    pub segment_estimate: Option<f32>,
}

impl CalibrationBuffer {
    pub fn clear(&mut self) {
        self.samples.clear();
        self.segment_estimate = None;
    }
}

/// ベースラインのずれ監視
#[derive(Debug, Clone, Copy, Default)]
pub struct DriftWatch {
    pub frames: u32,
    /// ずれ量の累積（正規化単位）
    pub offset_sum: f32,
}

impl DriftWatch {
    pub fn clear(&mut self) {
        self.frames = 0;
        self.offset_sum = 0.0;
    }
}

/// 1セット分の可変状態
///
/// フレーム処理はこれを `&mut` で受け取って進める。グローバル状態は持たない
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: Phase,
    pub locked_side: Option<Side>,

    pub is_calibrated: bool,
    /// `is_calibrated` の間だけ有効
    pub standing_baseline_y: f32,
    /// インチ / 正規化単位。`is_calibrated` の間だけ有効
    pub scale_factor: f32,
    pub calibration: CalibrationBuffer,

    /// 立位以外でのみ Some
    pub deepest_y: Option<f32>,
    pub velocity: VelocityTracker,
    /// 切り返し判定用の連続フレーム数
    pub reversal_streak: u32,

    pub stable_frames: u32,
    pub stable_standing_start: Option<Instant>,
    /// 立位で十分静止した（次のレップを受け付けてよい）
    pub standing_stable: bool,
    pub state_start_time: Option<Instant>,
    pub ascent_start_time: Option<Instant>,

    pub rep_times: Vec<f32>,
    pub rep_depths: Vec<f32>,
    pub rep_count: u32,

    pub tracking_loss_frames: u32,
    pub drift: DriftWatch,
}

impl SessionState {
    pub fn new(velocity_window: usize) -> Self {
        Self {
            phase: Phase::Standing,
            locked_side: None,
            is_calibrated: false,
            standing_baseline_y: 0.0,
            scale_factor: 0.0,
            calibration: CalibrationBuffer::default(),
            deepest_y: None,
            velocity: VelocityTracker::new(velocity_window),
            reversal_streak: 0,
            stable_frames: 0,
            stable_standing_start: None,
            standing_stable: false,
            state_start_time: None,
            ascent_start_time: None,
            rep_times: Vec::new(),
            rep_depths: Vec::new(),
            rep_count: 0,
            tracking_loss_frames: 0,
            drift: DriftWatch::default(),
        }
    }

    /// 正規化 y をベースラインからの深さ（インチ, 下向き正）に変換
    pub fn depth_inches(&self, y: f32) -> f32 {
        (y - self.standing_baseline_y) * self.scale_factor
    }

    /// 今のレップの最深点の深さ（インチ）
    pub fn max_depth_inches(&self) -> f32 {
        self.deepest_y.map_or(0.0, |d| self.depth_inches(d))
    }

    pub fn time_in_state(&self, now: Instant) -> Duration {
        self.state_start_time
            .map_or(Duration::ZERO, |t| now.saturating_duration_since(t))
    }

    pub(crate) fn enter(&mut self, phase: Phase, now: Instant) {
        self.phase = phase;
        self.state_start_time = Some(now);
        self.reversal_streak = 0;
    }

    /// 立位に戻す。レップ数と履歴は残す
    pub fn reset_rep(&mut self, now: Instant) {
        self.enter(Phase::Standing, now);
        self.deepest_y = None;
        self.ascent_start_time = None;
        self.velocity.clear();
        self.stable_frames = 0;
        self.stable_standing_start = None;
        self.standing_stable = false;
        self.drift.clear();
    }

    /// トラッキング喪失後: キャリブレーションと左右ロックもやり直す
    pub fn reset_tracking(&mut self, now: Instant) {
        self.reset_rep(now);
        self.velocity.reset();
        self.locked_side = None;
        self.is_calibrated = false;
        self.standing_baseline_y = 0.0;
        self.scale_factor = 0.0;
        self.calibration.clear();
        self.tracking_loss_frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_at_rest() {
        let s = SessionState::new(5);
        assert_eq!(s.phase, Phase::Standing);
        assert!(s.locked_side.is_none());
        assert!(!s.is_calibrated);
        assert!(s.deepest_y.is_none());
        assert_eq!(s.rep_count, 0);
        assert!(s.rep_times.is_empty());
    }

    #[test]
    fn test_depth_inches_downward_positive() {
        let mut s = SessionState::new(5);
        s.standing_baseline_y = 0.5;
        s.scale_factor = 100.0;
        assert!((s.depth_inches(0.6) - 10.0).abs() < 1e-4);
        assert!(s.depth_inches(0.45) < 0.0);
    }

    #[test]
    fn test_reset_rep_keeps_history() {
        let now = Instant::now();
        let mut s = SessionState::new(5);
        s.is_calibrated = true;
        s.phase = Phase::Ascending;
        s.deepest_y = Some(0.7);
        s.rep_count = 3;
        s.rep_times = vec![1.0, 1.1, 1.2];
        s.locked_side = Some(Side::Left);
        s.reset_rep(now);
        assert_eq!(s.phase, Phase::Standing);
        assert!(s.deepest_y.is_none());
        assert_eq!(s.rep_count, 3);
        assert_eq!(s.rep_times.len(), 3);
        assert!(s.is_calibrated);
        assert_eq!(s.locked_side, Some(Side::Left));
    }

    #[test]
    fn test_reset_tracking_clears_calibration() {
        let now = Instant::now();
        let mut s = SessionState::new(5);
        s.is_calibrated = true;
        s.locked_side = Some(Side::Right);
        s.rep_count = 2;
        s.tracking_loss_frames = 20;
        s.reset_tracking(now);
        assert!(!s.is_calibrated);
        assert!(s.locked_side.is_none());
        assert_eq!(s.tracking_loss_frames, 0);
        assert_eq!(s.rep_count, 2);
    }
}

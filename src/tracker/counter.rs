use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::config::{Config, ExerciseKind, ExerciseProfile, ScoringConfig};
use crate::error::FrameError;
use crate::pose::{Landmark, Pose, Side};

use super::calibration::{CalibrationStatus, Calibrator};
use super::drift::DriftWatchdog;
use super::phase::{PhaseMachine, Transition};
use super::score::{DepthQuality, RepScore, RepScorer};
use super::session::{Phase, SessionState};
use super::side::SideSelector;

/// "Ready" を出すまでの遅延
const READY_DELAY: Duration = Duration::from_millis(1500);

/// 完了したレップ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepEvent {
    pub rep: u32,
    pub ascent_secs: f32,
    pub depth_inches: f32,
    pub speed_score: f32,
    pub quality: DepthQuality,
}

/// ホスト側に依頼する表示・通知
///
/// コアはこれを返すだけで実行しない。`delay` 付きの Feedback は
/// ホストのスケジューラで遅らせて表示してよい（状態には影響しない）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    Feedback { text: String, delay: Option<Duration> },
    Status(Phase),
    RepCounter(u32),
    RepCompleted(RepEvent),
}

impl Effect {
    fn feedback(text: impl Into<String>) -> Self {
        Effect::Feedback {
            text: text.into(),
            delay: None,
        }
    }

    fn delayed(text: impl Into<String>, delay: Duration) -> Self {
        Effect::Feedback {
            text: text.into(),
            delay: Some(delay),
        }
    }
}

/// 1フレームの処理結果
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    pub phase: Phase,
    pub side: Option<Side>,
    /// 較正済みで関節が見えているときの現在の深さ
    pub depth_inches: Option<f32>,
    pub effects: Vec<Effect>,
}

/// フレーム単位のレップ計測パイプライン
///
/// 左右選択 → 位置抽出 → キャリブレーション → 速度 → 局面判定 → 採点。
/// 1回の `process` が完了するまで次のフレームもリセットも入らない
pub struct RepCounter {
    kind: ExerciseKind,
    profile: ExerciseProfile,
    selector: SideSelector,
    calibrator: Calibrator,
    machine: PhaseMachine,
    watchdog: DriftWatchdog,
    scorer: RepScorer,
    state: SessionState,
}

impl RepCounter {
    pub fn new(config: &Config, kind: ExerciseKind) -> Self {
        Self::from_profile(
            kind,
            config.profile(kind).clone(),
            &config.scoring,
            config.app.body_height_inches,
        )
    }

    pub fn from_profile(
        kind: ExerciseKind,
        profile: ExerciseProfile,
        scoring: &ScoringConfig,
        body_height_inches: f32,
    ) -> Self {
        Self {
            kind,
            selector: SideSelector::from_profile(&profile),
            calibrator: Calibrator::from_profile(&profile, body_height_inches),
            machine: PhaseMachine::from_profile(&profile),
            watchdog: DriftWatchdog::from_profile(&profile),
            scorer: RepScorer::from_config(&profile, scoring),
            state: SessionState::new(profile.velocity_window),
            profile,
        }
    }

    pub fn kind(&self) -> ExerciseKind {
        self.kind
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// セッションを初期値に戻す（レップ数・履歴も消える）
    pub fn reset(&mut self) {
        log::info!("session reset ({} reps discarded)", self.state.rep_count);
        self.state = SessionState::new(self.profile.velocity_window);
    }

    /// 直近レップの速度低下サマリ
    pub fn summary(&self) -> Vec<RepScore> {
        self.scorer.summary(&self.state.rep_times, &self.state.rep_depths)
    }

    /// 生のランドマーク列を検証してから処理する
    pub fn process_landmarks(&mut self, landmarks: &[Landmark], now: Instant) -> Result<FrameOutput, FrameError> {
        let pose = Pose::from_landmarks(landmarks)?;
        Ok(self.process(&pose, now))
    }

    pub fn process(&mut self, pose: &Pose, now: Instant) -> FrameOutput {
        let prev_phase = self.state.phase;
        let mut effects = Vec::new();

        let side = self.selector.select(pose, &mut self.state);
        let depth_inches = match side {
            Some(side) => self.process_tracked(pose, side, now, &mut effects),
            None => {
                self.handle_tracking_loss(now, &mut effects);
                None
            }
        };

        if self.state.phase != prev_phase {
            effects.insert(0, Effect::Status(self.state.phase));
        }
        FrameOutput {
            phase: self.state.phase,
            side,
            depth_inches,
            effects,
        }
    }

    fn handle_tracking_loss(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        // 立位中の一時的な喪失は黙って無視
        if self.state.phase == Phase::Standing
            || self.state.tracking_loss_frames <= self.profile.max_tracking_loss_frames
        {
            return;
        }
        log::warn!(
            "tracking lost for {} frames during {}, resetting",
            self.state.tracking_loss_frames,
            self.state.phase
        );
        self.state.reset_tracking(now);
        effects.push(Effect::feedback("Tracking lost - step back into view"));
    }

    fn process_tracked(&mut self, pose: &Pose, side: Side, now: Instant, effects: &mut Vec<Effect>) -> Option<f32> {
        let y = pose.get(self.profile.tracked.on(side)).y;

        if !self.state.is_calibrated {
            let a = pose.get(self.profile.segment[0].on(side));
            let b = pose.get(self.profile.segment[1].on(side));
            self.state.velocity.update(y);
            match self.calibrator.update(&mut self.state, y, a.distance(b), now) {
                CalibrationStatus::Collecting { samples: 1, .. } => {
                    effects.push(Effect::feedback("Calibrating - hold still"));
                }
                CalibrationStatus::Restarted => {
                    effects.push(Effect::feedback("Hold still"));
                }
                CalibrationStatus::Complete { .. } => {
                    effects.push(Effect::feedback("Calibrated"));
                    effects.push(Effect::delayed("Ready", READY_DELAY));
                }
                _ => {}
            }
            return None;
        }

        let velocity = self.state.velocity.update(y);
        match self.machine.step(&mut self.state, y, velocity, now) {
            Transition::None | Transition::StartedDescent => {}
            Transition::Reversed { depth_inches } => {
                effects.push(Effect::feedback(self.scorer.quality(depth_inches).label()));
            }
            Transition::Completed {
                ascent_secs,
                depth_inches,
            } => {
                let event = RepEvent {
                    rep: self.state.rep_count,
                    ascent_secs,
                    depth_inches,
                    speed_score: self.scorer.speed_score(ascent_secs, depth_inches),
                    quality: self.scorer.quality(depth_inches),
                };
                effects.push(Effect::feedback(format!("Rep {}: {}", event.rep, event.quality)));
                effects.push(Effect::RepCounter(self.state.rep_count));
                effects.push(Effect::RepCompleted(event));
                effects.push(Effect::delayed("Ready", READY_DELAY));
            }
            Transition::TooShallow { depth_inches } => {
                effects.push(Effect::feedback(format!(
                    "Too shallow ({:.1} in) - go deeper",
                    depth_inches
                )));
            }
            Transition::Abandoned { .. } => {
                effects.push(Effect::feedback("Rep abandoned"));
            }
        }

        self.watchdog.update(&mut self.state, y);
        Some(self.state.depth_inches(y))
    }
}

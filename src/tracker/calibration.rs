use std::time::Instant;

use crate::config::ExerciseProfile;

use super::session::{Phase, SessionState};

/// 体節長ブレンドの重み（旧値側）
const SEGMENT_BLEND_OLD: f32 = 0.8;
/// 直近平均に使うサンプル数
const ROLLING_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationStatus {
    /// 立位でない、または既に完了
    Idle,
    /// 体節長が妥当範囲外のフレームを捨てた
    Rejected { segment: f32 },
    /// ブレが大きくバッファを捨ててやり直した
    Restarted,
    Collecting { samples: usize, needed: usize },
    Complete { baseline_y: f32, scale_factor: f32 },
}

/// 正規化座標 → インチ換算の単位キャリブレーション
///
/// 静止した立位から基準 y と体節長を集め、既知の体節長（身長 × 比率）で
/// スケールを決める。ブレたらバッファを全部捨てる
pub struct Calibrator {
    samples_needed: usize,
    tolerance: f32,
    segment_range: [f32; 2],
    segment_inches: f32,
}

impl Calibrator {
    pub fn from_profile(profile: &ExerciseProfile, body_height_inches: f32) -> Self {
        Self {
            samples_needed: profile.calibration_samples.max(1),
            tolerance: profile.calibration_tolerance,
            segment_range: profile.segment_range,
            segment_inches: body_height_inches * profile.segment_height_ratio,
        }
    }

    /// 1フレーム分のサンプルを取り込む
    ///
    /// `y` は追跡関節の正規化 y、`segment` は体節長（正規化座標）
    pub fn update(&self, state: &mut SessionState, y: f32, segment: f32, now: Instant) -> CalibrationStatus {
        if state.is_calibrated || state.phase != Phase::Standing {
            return CalibrationStatus::Idle;
        }
        if segment < self.segment_range[0] || segment > self.segment_range[1] {
            return CalibrationStatus::Rejected { segment };
        }

        let buf = &mut state.calibration;
        match buf.segment_estimate {
            None => {
                buf.samples.push(y);
                buf.segment_estimate = Some(segment);
            }
            Some(estimate) => {
                let recent = &buf.samples[buf.samples.len().saturating_sub(ROLLING_SAMPLES)..];
                let avg = recent.iter().sum::<f32>() / recent.len() as f32;
                if (y - avg).abs() <= estimate * self.tolerance {
                    buf.samples.push(y);
                    buf.segment_estimate =
                        Some(SEGMENT_BLEND_OLD * estimate + (1.0 - SEGMENT_BLEND_OLD) * segment);
                } else {
                    log::debug!(
                        "calibration restart: y={:.4} avg={:.4} after {} samples",
                        y,
                        avg,
                        buf.samples.len()
                    );
                    buf.clear();
                    buf.samples.push(y);
                    buf.segment_estimate = Some(segment);
                    return CalibrationStatus::Restarted;
                }
            }
        }

        if buf.samples.len() < self.samples_needed {
            return CalibrationStatus::Collecting {
                samples: buf.samples.len(),
                needed: self.samples_needed,
            };
        }

        let baseline_y = buf.samples.iter().sum::<f32>() / buf.samples.len() as f32;
        let estimate = buf.segment_estimate.unwrap_or(segment);
        let scale_factor = self.segment_inches / estimate;
        buf.clear();

        state.standing_baseline_y = baseline_y;
        state.scale_factor = scale_factor;
        state.is_calibrated = true;
        state.stable_frames = 0;
        state.stable_standing_start = Some(now);
        state.standing_stable = false;
        state.drift.clear();
        log::info!(
            "calibrated: baseline_y={:.4} scale={:.1} in/unit",
            baseline_y,
            scale_factor
        );
        CalibrationStatus::Complete {
            baseline_y,
            scale_factor,
        }
    }
}

use crate::config::ExerciseProfile;

use super::session::{Phase, SessionState};

/// 立位中のベースライン自動補正
///
/// 同じ向きの小さなずれが一定フレーム続いたら、その平均だけ基準 y を動かす。
/// 一瞬の揺れや大きな動き（レップ開始）は対象外
pub struct DriftWatchdog {
    band_inches: [f32; 2],
    frames_needed: u32,
}

impl DriftWatchdog {
    pub fn from_profile(profile: &ExerciseProfile) -> Self {
        Self {
            band_inches: profile.drift_band_inches,
            frames_needed: profile.drift_frames.max(1),
        }
    }

    /// 補正したらその量（インチ）を返す
    pub fn update(&self, state: &mut SessionState, y: f32) -> Option<f32> {
        if state.phase != Phase::Standing || !state.is_calibrated {
            state.drift.clear();
            return None;
        }

        let offset = y - state.standing_baseline_y;
        let offset_inches = (offset * state.scale_factor).abs();
        if offset_inches < self.band_inches[0] || offset_inches > self.band_inches[1] {
            state.drift.clear();
            return None;
        }

        // 向きが変わったら数え直し
        if state.drift.frames > 0 && (offset > 0.0) != (state.drift.offset_sum > 0.0) {
            state.drift.clear();
        }
        state.drift.frames += 1;
        state.drift.offset_sum += offset;

        if state.drift.frames < self.frames_needed {
            return None;
        }

        let mean = state.drift.offset_sum / state.drift.frames as f32;
        state.standing_baseline_y += mean;
        state.drift.clear();
        let shift = mean * state.scale_factor;
        log::info!(
            "baseline rebased by {:+.2} in (baseline_y={:.4})",
            shift,
            state.standing_baseline_y
        );
        Some(shift)
    }
}

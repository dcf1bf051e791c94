use std::time::{Duration, Instant};

use crate::config::ExerciseProfile;

use super::session::{Phase, SessionState};

/// Result of one state machine step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    None,
    /// standing -> descending
    StartedDescent,
    /// descending -> ascending, with the depth reached at the bottom
    Reversed { depth_inches: f32 },
    /// ascending -> standing; the rep has been appended to the history
    Completed { ascent_secs: f32, depth_inches: f32 },
    /// descending -> standing; reversal before minimum depth
    TooShallow { depth_inches: f32 },
    /// any -> standing after sitting in `phase` too long
    Abandoned { phase: Phase },
}

/// standing -> descending -> ascending -> standing
///
/// Depth is always in inches via the calibrated scale factor. Velocity only
/// decides *when* a transition fires; a depth condition always gates it.
pub struct PhaseMachine {
    descent_threshold: f32,
    hysteresis: f32,
    deep_multiplier: f32,
    descent_velocity: f32,
    ascent_velocity: f32,
    reversal_samples: u32,
    min_depth: f32,
    recovery_percent: f32,
    max_state: Duration,
    stability_band: f32,
    stability_frames: u32,
    stability_duration: Duration,
}

/// 負値・NaN は 0、表現できない大きさ（inf）は上限に丸める
fn secs(value: f32) -> Duration {
    Duration::try_from_secs_f32(value.max(0.0)).unwrap_or(Duration::MAX)
}

impl PhaseMachine {
    pub fn from_profile(profile: &ExerciseProfile) -> Self {
        Self {
            descent_threshold: profile.descent_threshold_inches,
            hysteresis: profile.hysteresis_inches,
            deep_multiplier: profile.deep_multiplier,
            descent_velocity: profile.descent_velocity,
            ascent_velocity: profile.ascent_velocity,
            reversal_samples: profile.reversal_samples.max(1),
            min_depth: profile.min_depth_inches,
            recovery_percent: profile.recovery_percent,
            max_state: secs(profile.max_state_secs),
            stability_band: profile.stability_band_inches,
            stability_frames: profile.stability_frames,
            stability_duration: secs(profile.stability_secs),
        }
    }

    /// Advance one frame. `y` is the tracked joint, `velocity` the smoothed
    /// velocity already updated with `y`.
    pub fn step(&self, state: &mut SessionState, y: f32, velocity: f32, now: Instant) -> Transition {
        if !state.is_calibrated {
            return Transition::None;
        }

        if state.phase != Phase::Standing && state.time_in_state(now) > self.max_state {
            let phase = state.phase;
            log::warn!(
                "{} for {:.1}s, abandoning rep",
                phase,
                state.time_in_state(now).as_secs_f32()
            );
            state.reset_rep(now);
            return Transition::Abandoned { phase };
        }

        match state.phase {
            Phase::Standing => self.step_standing(state, y, velocity, now),
            Phase::Descending => self.step_descending(state, y, velocity, now),
            Phase::Ascending => self.step_ascending(state, y, now),
        }
    }

    fn step_standing(&self, state: &mut SessionState, y: f32, velocity: f32, now: Instant) -> Transition {
        let depth = state.depth_inches(y);

        let moving_down = velocity > self.descent_velocity;
        let well_past = depth > self.descent_threshold * self.deep_multiplier;
        if state.standing_stable && depth > self.descent_threshold + self.hysteresis && (moving_down || well_past) {
            state.enter(Phase::Descending, now);
            state.deepest_y = Some(y);
            state.velocity.clear();
            state.drift.clear();
            log::info!("descending (depth {:.1} in, v={:.4})", depth, velocity);
            return Transition::StartedDescent;
        }

        // 一度安定したら次のレップ開始までラッチ
        if !state.standing_stable {
            if depth.abs() <= self.stability_band {
                state.stable_frames += 1;
                let since = *state.stable_standing_start.get_or_insert(now);
                if state.stable_frames >= self.stability_frames
                    && now.saturating_duration_since(since) >= self.stability_duration
                {
                    state.standing_stable = true;
                    log::debug!("standing stable after {} frames", state.stable_frames);
                }
            } else {
                state.stable_frames = 0;
                state.stable_standing_start = None;
            }
        }
        Transition::None
    }

    fn step_descending(&self, state: &mut SessionState, y: f32, velocity: f32, now: Instant) -> Transition {
        let deepest = state.deepest_y.map_or(y, |d| d.max(y));
        state.deepest_y = Some(deepest);

        if velocity < -self.ascent_velocity {
            state.reversal_streak += 1;
        } else {
            state.reversal_streak = 0;
        }
        if state.reversal_streak < self.reversal_samples {
            return Transition::None;
        }

        let depth_inches = state.max_depth_inches();
        if depth_inches >= self.min_depth {
            state.enter(Phase::Ascending, now);
            state.ascent_start_time = Some(now);
            log::info!("ascending from {:.1} in", depth_inches);
            Transition::Reversed { depth_inches }
        } else {
            log::info!("reversal at {:.1} in, below minimum {:.1}", depth_inches, self.min_depth);
            state.reset_rep(now);
            Transition::TooShallow { depth_inches }
        }
    }

    fn step_ascending(&self, state: &mut SessionState, y: f32, now: Instant) -> Transition {
        let deepest = state.deepest_y.map_or(y, |d| d.max(y));
        state.deepest_y = Some(deepest);

        let total = deepest - state.standing_baseline_y;
        let recovered = if total > 0.0 {
            (deepest - y) / total * 100.0
        } else {
            0.0
        };
        let depth_now = state.depth_inches(y);
        let depth_inches = state.max_depth_inches();

        if recovered >= self.recovery_percent
            && depth_now < self.descent_threshold - self.hysteresis
            && depth_inches >= self.min_depth
        {
            let ascent_secs = state
                .ascent_start_time
                .map_or(0.0, |t| now.saturating_duration_since(t).as_secs_f32());
            state.rep_times.push(ascent_secs);
            state.rep_depths.push(depth_inches);
            state.rep_count += 1;
            log::info!(
                "rep {} complete: {:.1} in, ascent {:.2}s",
                state.rep_count,
                depth_inches,
                ascent_secs
            );
            state.reset_rep(now);
            return Transition::Completed {
                ascent_secs,
                depth_inches,
            };
        }
        Transition::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FRAME: Duration = Duration::from_millis(33);

    /// 0.01 正規化単位 = 1 インチ、基準 y = 0.4
    fn ready_state(profile: &ExerciseProfile) -> SessionState {
        let mut s = SessionState::new(profile.velocity_window);
        s.is_calibrated = true;
        s.standing_baseline_y = 0.4;
        s.scale_factor = 100.0;
        s.standing_stable = true;
        s
    }

    fn y_at(depth_inches: f32) -> f32 {
        0.4 + depth_inches / 100.0
    }

    struct Driver {
        machine: PhaseMachine,
        state: SessionState,
        now: Instant,
    }

    impl Driver {
        fn new(profile: ExerciseProfile) -> Self {
            Self {
                machine: PhaseMachine::from_profile(&profile),
                state: ready_state(&profile),
                now: Instant::now(),
            }
        }

        fn feed(&mut self, depth_inches: f32) -> Transition {
            self.now += FRAME;
            let y = y_at(depth_inches);
            let v = self.state.velocity.update(y);
            self.machine.step(&mut self.state, y, v, self.now)
        }

        fn feed_all(&mut self, depths: &[f32]) -> Vec<Transition> {
            depths
                .iter()
                .map(|&d| self.feed(d))
                .filter(|t| *t != Transition::None)
                .collect()
        }
    }

    fn ramp(from: f32, to: f32, steps: usize) -> Vec<f32> {
        (1..=steps)
            .map(|i| from + (to - from) * i as f32 / steps as f32)
            .collect()
    }

    #[test]
    fn test_full_rep() {
        let mut d = Driver::new(ExerciseProfile::squat());
        d.feed_all(&[0.0; 5]);
        let mut depths = ramp(0.0, 12.0, 15);
        depths.extend(ramp(12.0, 0.0, 15));
        depths.extend([0.0; 5]);
        let transitions = d.feed_all(&depths);

        assert_eq!(transitions.len(), 3, "{:?}", transitions);
        assert_eq!(transitions[0], Transition::StartedDescent);
        match transitions[1] {
            Transition::Reversed { depth_inches } => assert_relative_eq!(depth_inches, 12.0, epsilon = 1e-3),
            other => panic!("unexpected {:?}", other),
        }
        match transitions[2] {
            Transition::Completed { depth_inches, ascent_secs } => {
                assert_relative_eq!(depth_inches, 12.0, epsilon = 1e-3);
                assert!(ascent_secs > 0.0 && ascent_secs < 0.5);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(d.state.rep_count, 1);
        assert_eq!(d.state.rep_times.len(), 1);
        assert_eq!(d.state.rep_depths.len(), 1);
        assert_eq!(d.state.phase, Phase::Standing);
        assert!(d.state.deepest_y.is_none());
    }

    #[test]
    fn test_shallow_reversal_rejected() {
        let mut d = Driver::new(ExerciseProfile::squat());
        d.feed_all(&[0.0; 5]);
        let mut depths = ramp(0.0, 5.5, 10);
        depths.extend(ramp(5.5, 0.0, 10));
        let transitions = d.feed_all(&depths);
        assert_eq!(transitions[0], Transition::StartedDescent);
        assert!(matches!(transitions[1], Transition::TooShallow { .. }));
        assert_eq!(d.state.rep_count, 0);
        assert_eq!(d.state.phase, Phase::Standing);
    }

    #[test]
    fn test_requires_stability() {
        let mut d = Driver::new(ExerciseProfile::squat());
        d.state.standing_stable = false;
        let transitions = d.feed_all(&ramp(0.0, 12.0, 10));
        assert!(transitions.is_empty());
        assert_eq!(d.state.phase, Phase::Standing);
    }

    #[test]
    fn test_stability_latches_after_band_hold() {
        let mut d = Driver::new(ExerciseProfile::squat());
        d.state.standing_stable = false;
        // 10 フレームでは 0.5s に届かない
        d.feed_all(&[0.2; 10]);
        assert!(!d.state.standing_stable);
        d.feed_all(&[0.2; 8]);
        assert!(d.state.standing_stable);
        // 帯域外に出てもラッチは外れない
        d.feed(3.0);
        assert!(d.state.standing_stable);
    }

    #[test]
    fn test_hysteresis_blocks_boundary() {
        let mut d = Driver::new(ExerciseProfile::squat());
        // 4.0 + 0.75 を超えない
        let transitions = d.feed_all(&ramp(0.0, 4.7, 10));
        assert!(transitions.is_empty());
    }

    #[test]
    fn test_deep_slow_start_triggers_without_velocity() {
        let mut d = Driver::new(ExerciseProfile::squat());
        // velocity = 0 でも深さ 8 in 超で発火
        let t = d.machine.step(&mut d.state, y_at(8.5), 0.0, d.now + FRAME);
        assert_eq!(t, Transition::StartedDescent);
    }

    #[test]
    fn test_stall_in_descent_abandons() {
        let mut d = Driver::new(ExerciseProfile::squat());
        d.feed_all(&ramp(0.0, 8.0, 8));
        assert_eq!(d.state.phase, Phase::Descending);
        d.now += Duration::from_secs(9);
        let t = d.feed(8.0);
        assert_eq!(t, Transition::Abandoned { phase: Phase::Descending });
        assert_eq!(d.state.phase, Phase::Standing);
        assert!(d.state.deepest_y.is_none());
        assert_eq!(d.state.rep_count, 0);
    }

    #[test]
    fn test_recovery_percent_gate() {
        let profile = ExerciseProfile::press();
        let mut d = Driver::new(profile);
        d.state.phase = Phase::Ascending;
        d.state.state_start_time = Some(d.now);
        d.state.ascent_start_time = Some(d.now);
        d.state.deepest_y = Some(y_at(10.0));

        // 70% 回復、深さ 3 in: まだ
        assert_eq!(d.feed(3.0), Transition::None);
        assert_eq!(d.state.phase, Phase::Ascending);
        // 80% 回復、深さ 2 in < 3.0 - 0.5
        match d.feed(2.0) {
            Transition::Completed { depth_inches, .. } => assert_relative_eq!(depth_inches, 10.0, epsilon = 1e-3),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(d.state.rep_count, 1);
        assert_eq!(d.state.rep_times.len(), 1);
        assert_eq!(d.state.rep_depths.len(), 1);
    }

    #[test]
    fn test_unbounded_state_time_never_abandons() {
        let profile = ExerciseProfile {
            max_state_secs: f32::INFINITY,
            ..ExerciseProfile::squat()
        };
        let mut d = Driver::new(profile);
        d.feed_all(&ramp(0.0, 8.0, 8));
        assert_eq!(d.state.phase, Phase::Descending);
        d.now += Duration::from_secs(3600);
        assert_eq!(d.feed(8.0), Transition::None);
        assert_eq!(d.state.phase, Phase::Descending);
    }

    #[test]
    fn test_uncalibrated_does_nothing() {
        let mut d = Driver::new(ExerciseProfile::squat());
        d.state.is_calibrated = false;
        assert!(d.feed_all(&ramp(0.0, 15.0, 10)).is_empty());
    }
}

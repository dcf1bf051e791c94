use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{ExerciseProfile, QualityBands, ScoringConfig};

/// Depth quality, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DepthQuality {
    Shallow,
    Partial,
    Good,
    Full,
}

impl DepthQuality {
    pub fn label(self) -> &'static str {
        match self {
            DepthQuality::Shallow => "Shallow",
            DepthQuality::Partial => "Partial ROM",
            DepthQuality::Good => "Good depth",
            DepthQuality::Full => "Full ROM",
        }
    }
}

impl fmt::Display for DepthQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Velocity-drop severity relative to the first rep of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FatigueLevel {
    Fine,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepScore {
    /// 1-based rep number within the session
    pub rep: usize,
    pub ascent_secs: f32,
    pub depth_inches: f32,
    pub speed_score: f32,
    pub quality: DepthQuality,
    /// Percent below the first rep's score; negative when faster.
    pub drop_percent: f32,
    pub level: FatigueLevel,
}

pub struct RepScorer {
    reference_depth: f32,
    bands: QualityBands,
    min_ascent_secs: f32,
    warning_drop: f32,
    critical_drop: f32,
    display_reps: usize,
}

impl RepScorer {
    pub fn from_config(profile: &ExerciseProfile, scoring: &ScoringConfig) -> Self {
        Self {
            reference_depth: profile.reference_depth_inches,
            bands: profile.quality_bands,
            min_ascent_secs: scoring.min_ascent_secs.max(f32::EPSILON),
            warning_drop: scoring.warning_drop_percent,
            critical_drop: scoring.critical_drop_percent,
            display_reps: scoring.display_reps,
        }
    }

    /// 100 means a reference-depth rep with a one second ascent.
    pub fn speed_score(&self, ascent_secs: f32, depth_inches: f32) -> f32 {
        let t = ascent_secs.max(self.min_ascent_secs);
        100.0 * (depth_inches.max(0.0) / self.reference_depth) / t
    }

    pub fn quality(&self, depth_inches: f32) -> DepthQuality {
        if depth_inches >= self.bands.full {
            DepthQuality::Full
        } else if depth_inches >= self.bands.good {
            DepthQuality::Good
        } else if depth_inches >= self.bands.partial {
            DepthQuality::Partial
        } else {
            DepthQuality::Shallow
        }
    }

    pub fn fatigue_level(&self, drop_percent: f32) -> FatigueLevel {
        if drop_percent >= self.critical_drop {
            FatigueLevel::Critical
        } else if drop_percent >= self.warning_drop {
            FatigueLevel::Warning
        } else {
            FatigueLevel::Fine
        }
    }

    /// Score the most recent reps against the session's first rep.
    pub fn summary(&self, rep_times: &[f32], rep_depths: &[f32]) -> Vec<RepScore> {
        let count = rep_times.len().min(rep_depths.len());
        if count == 0 {
            return Vec::new();
        }
        let first = self.speed_score(rep_times[0], rep_depths[0]);
        let start = count.saturating_sub(self.display_reps);
        (start..count)
            .map(|i| {
                let score = self.speed_score(rep_times[i], rep_depths[i]);
                let drop_percent = if first > 0.0 {
                    (1.0 - score / first) * 100.0
                } else {
                    0.0
                };
                RepScore {
                    rep: i + 1,
                    ascent_secs: rep_times[i],
                    depth_inches: rep_depths[i],
                    speed_score: score,
                    quality: self.quality(rep_depths[i]),
                    drop_percent,
                    level: self.fatigue_level(drop_percent),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scorer() -> RepScorer {
        RepScorer::from_config(&ExerciseProfile::squat(), &ScoringConfig::default())
    }

    #[test]
    fn test_reference_rep_scores_100() {
        assert_relative_eq!(scorer().speed_score(1.0, 12.0), 100.0, epsilon = 1e-4);
    }

    #[test]
    fn test_score_monotonic() {
        let s = scorer();
        assert!(s.speed_score(1.0, 10.0) > s.speed_score(1.0, 8.0));
        assert!(s.speed_score(0.8, 10.0) > s.speed_score(1.2, 10.0));
    }

    #[test]
    fn test_zero_ascent_is_clamped() {
        let s = scorer();
        assert!(s.speed_score(0.0, 12.0).is_finite());
        assert_relative_eq!(s.speed_score(0.0, 12.0), s.speed_score(0.1, 12.0));
    }

    #[test]
    fn test_quality_bands() {
        let s = scorer();
        assert_eq!(s.quality(3.0), DepthQuality::Shallow);
        assert_eq!(s.quality(6.0), DepthQuality::Partial);
        assert_eq!(s.quality(9.5), DepthQuality::Good);
        assert_eq!(s.quality(12.0), DepthQuality::Full);
        assert_eq!(DepthQuality::Full.label(), "Full ROM");
    }

    #[test]
    fn test_summary_against_first_rep() {
        let s = scorer();
        let times = [1.0, 1.05, 1.15, 1.3, 1.4, 1.6];
        let depths = [12.0; 6];
        let reps = s.summary(&times, &depths);
        assert_eq!(reps.len(), 5);
        assert_eq!(reps[0].rep, 2);
        assert_eq!(reps[4].rep, 6);
        // 1 - 1/1.05 ≈ 4.8%
        assert_eq!(reps[0].level, FatigueLevel::Fine);
        // 1 - 1/1.15 ≈ 13%
        assert_eq!(reps[1].level, FatigueLevel::Warning);
        // 1 - 1/1.6 = 37.5%
        assert_relative_eq!(reps[4].drop_percent, 37.5, epsilon = 1e-3);
        assert_eq!(reps[4].level, FatigueLevel::Critical);
    }

    #[test]
    fn test_equal_reps_score_equal_regardless_of_history() {
        let s = scorer();
        let times = [0.6, 0.9, 1.2, 0.6];
        let depths = [11.0, 8.0, 12.0, 11.0];
        let reps = s.summary(&times, &depths);
        assert_relative_eq!(reps[3].speed_score, reps[0].speed_score);
        assert_relative_eq!(reps[3].speed_score, s.speed_score(0.6, 11.0));
        assert_relative_eq!(reps[3].drop_percent, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_summary_empty() {
        assert!(scorer().summary(&[], &[]).is_empty());
    }

    #[test]
    fn test_first_rep_has_no_drop() {
        let reps = scorer().summary(&[0.9], &[10.0]);
        assert_eq!(reps.len(), 1);
        assert_relative_eq!(reps[0].drop_percent, 0.0);
        assert_eq!(reps[0].level, FatigueLevel::Fine);
    }
}

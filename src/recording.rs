//! JSON-lines landmark recordings and a synthetic session generator.
//!
//! One frame per line: `{"t_ms": 33, "landmarks": [[x, y, visibility], ...]}`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::config::ExerciseProfile;
use crate::pose::{Joint, Landmark, LandmarkIndex, Side};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub t_ms: u64,
    pub landmarks: Vec<[f32; 3]>,
}

impl FrameRecord {
    pub fn landmarks(&self) -> Vec<Landmark> {
        self.landmarks.iter().copied().map(Landmark::from).collect()
    }
}

pub fn read_recording<P: AsRef<Path>>(path: P) -> Result<Vec<FrameRecord>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut frames = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: FrameRecord =
            serde_json::from_str(&line).with_context(|| format!("line {}", i + 1))?;
        frames.push(record);
    }
    Ok(frames)
}

pub fn write_recording<P: AsRef<Path>>(path: P, frames: &[FrameRecord]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for frame in frames {
        serde_json::to_writer(&mut out, frame)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// 合成セッションのパラメータ
#[derive(Debug, Clone)]
pub struct SyntheticSession {
    pub fps: f32,
    pub standing_secs: f32,
    pub reps: usize,
    pub depth_inches: f32,
    pub descent_secs: f32,
    pub first_ascent_secs: f32,
    /// レップごとの上昇時間の伸び率（疲労）
    pub ascent_growth: f32,
    pub pause_secs: f32,
    /// 正規化座標での体節長
    pub segment_length: f32,
    pub body_height_inches: f32,
}

impl Default for SyntheticSession {
    fn default() -> Self {
        Self {
            fps: 30.0,
            standing_secs: 2.0,
            reps: 5,
            depth_inches: 12.0,
            descent_secs: 1.0,
            first_ascent_secs: 0.8,
            ascent_growth: 0.08,
            pause_secs: 1.5,
            segment_length: 0.18,
            body_height_inches: 68.0,
        }
    }
}

impl SyntheticSession {
    /// 追跡関節の y 軌跡（正規化座標）を生成する
    fn trajectory(&self, profile: &ExerciseProfile, base_y: f32) -> Vec<f32> {
        let inches_per_unit = self.body_height_inches * profile.segment_height_ratio / self.segment_length;
        let depth = self.depth_inches / inches_per_unit;
        let frames = |secs: f32| (secs * self.fps).round().max(1.0) as usize;
        // 0→1 のコサインイーズ
        let ease = |i: usize, n: usize| (1.0 - (PI * i as f32 / n as f32).cos()) / 2.0;

        let mut ys = vec![base_y; frames(self.standing_secs)];
        for rep in 0..self.reps {
            let down = frames(self.descent_secs);
            ys.extend((1..=down).map(|i| base_y + depth * ease(i, down)));
            let ascent = self.first_ascent_secs * (1.0 + self.ascent_growth).powi(rep as i32);
            let up = frames(ascent);
            ys.extend((1..=up).map(|i| base_y + depth * (1.0 - ease(i, up))));
            ys.extend(std::iter::repeat(base_y).take(frames(self.pause_secs)));
        }
        ys
    }

    pub fn generate(&self, profile: &ExerciseProfile) -> Vec<FrameRecord> {
        let (base_y, anchor_y) = match profile.tracked {
            // 腰を追う: 膝は腰の下
            Joint::Hip | Joint::Knee | Joint::Ankle => (0.45, 0.45 + self.segment_length),
            // 手首を追う: ロックアウト（肩→手首 = 体節長）から下ろす
            _ => (0.35 - self.segment_length, 0.35),
        };
        let frame_ms = 1000.0 / self.fps;
        self.trajectory(profile, base_y)
            .into_iter()
            .enumerate()
            .map(|(i, y)| FrameRecord {
                t_ms: (i as f32 * frame_ms).round() as u64,
                landmarks: self.pose_landmarks(profile, y, anchor_y),
            })
            .collect()
    }

    fn pose_landmarks(&self, profile: &ExerciseProfile, y: f32, anchor_y: f32) -> Vec<[f32; 3]> {
        let mut landmarks = vec![[0.5, 0.5, 0.3]; LandmarkIndex::COUNT];
        for (side, x, vis) in [(Side::Left, 0.45, 0.95), (Side::Right, 0.55, 0.85)] {
            let mut set = |joint: Joint, y: f32| landmarks[joint.on(side) as usize] = [x, y, vis];
            match profile.tracked {
                Joint::Hip | Joint::Knee | Joint::Ankle => {
                    set(Joint::Shoulder, y - 0.25);
                    set(Joint::Hip, y);
                    set(Joint::Knee, anchor_y);
                    set(Joint::Ankle, anchor_y + 0.2);
                }
                _ => {
                    set(Joint::Shoulder, anchor_y);
                    set(Joint::Elbow, (anchor_y + y) / 2.0);
                    set(Joint::Wrist, y);
                    set(Joint::Hip, anchor_y + 0.3);
                }
            }
        }
        landmarks
    }
}

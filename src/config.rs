use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::FrameError;
use crate::pose::Joint;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub scoring: ScoringConfig,
    pub squat: ExerciseProfile,
    pub press: ExerciseProfile,
}

/// toml のままの形。種目セクションはデフォルトに上書きマージする
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    app: AppConfig,
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    scoring: ScoringConfig,
    squat: Option<toml::Table>,
    press: Option<toml::Table>,
}

/// 対応種目
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseKind {
    Squat,
    Press,
}

impl ExerciseKind {
    pub fn name(self) -> &'static str {
        match self {
            ExerciseKind::Squat => "squat",
            ExerciseKind::Press => "press",
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExerciseKind {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "squat" => Ok(ExerciseKind::Squat),
            "press" => Ok(ExerciseKind::Press),
            other => Err(FrameError::UnknownExercise(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// 起動時の種目
    #[serde(default = "default_exercise")]
    pub exercise: ExerciseKind,
    /// 身長（インチ）。セグメント長の物理換算に使う
    #[serde(default = "default_body_height")]
    pub body_height_inches: f32,
}

fn default_exercise() -> ExerciseKind { ExerciseKind::Squat }
fn default_body_height() -> f32 { 68.0 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            exercise: default_exercise(),
            body_height_inches: default_body_height(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String { "127.0.0.1:39600".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: default_server_addr() }
    }
}

/// 疲労（速度低下）判定
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// この低下率（%）以上で warning
    #[serde(default = "default_warning_drop")]
    pub warning_drop_percent: f32,
    /// この低下率（%）以上で critical
    #[serde(default = "default_critical_drop")]
    pub critical_drop_percent: f32,
    /// 表示する直近レップ数
    #[serde(default = "default_display_reps")]
    pub display_reps: usize,
    /// 上昇時間の下限（秒）。0除算防止
    #[serde(default = "default_min_ascent")]
    pub min_ascent_secs: f32,
}

fn default_warning_drop() -> f32 { 10.0 }
fn default_critical_drop() -> f32 { 20.0 }
fn default_display_reps() -> usize { 5 }
fn default_min_ascent() -> f32 { 0.1 }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            warning_drop_percent: default_warning_drop(),
            critical_drop_percent: default_critical_drop(),
            display_reps: default_display_reps(),
            min_ascent_secs: default_min_ascent(),
        }
    }
}

/// 深さ品質ラベルの境界（インチ）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityBands {
    pub partial: f32,
    pub good: f32,
    pub full: f32,
}

/// 種目ごとの定数一式。状態機械はこれだけを見て動く
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseProfile {
    /// 深さを測る関節
    pub tracked: Joint,
    /// スケール算出に使う体節の両端
    pub segment: [Joint; 2],
    /// 体節長 / 身長
    pub segment_height_ratio: f32,
    /// 体節長の妥当範囲（正規化座標）
    pub segment_range: [f32; 2],
    pub needs_shoulder: bool,
    pub needs_wrist: bool,

    pub visibility_threshold: f32,
    /// 左右切替に必要な可視性の差
    pub side_flip_margin: f32,

    pub calibration_samples: usize,
    /// 体節長に対する許容ブレの比率
    pub calibration_tolerance: f32,

    pub stability_band_inches: f32,
    pub stability_frames: u32,
    pub stability_secs: f32,

    pub descent_threshold_inches: f32,
    pub hysteresis_inches: f32,
    /// 速度が出ていなくても下降とみなす深さの倍率
    pub deep_multiplier: f32,
    /// 正規化単位/フレーム（下向き正）
    pub descent_velocity: f32,
    /// 正規化単位/フレーム。平滑化速度が -ascent_velocity を下回れば切り返し
    pub ascent_velocity: f32,
    pub reversal_samples: u32,
    pub min_depth_inches: f32,
    pub recovery_percent: f32,
    pub max_state_secs: f32,
    pub max_tracking_loss_frames: u32,
    pub velocity_window: usize,

    /// ベースライン補正対象となるズレ幅 [min, max]（インチ）
    pub drift_band_inches: [f32; 2],
    pub drift_frames: u32,

    pub quality_bands: QualityBands,
    /// スコア計算の基準深さ（インチ）
    pub reference_depth_inches: f32,
}

impl ExerciseProfile {
    pub fn squat() -> Self {
        Self {
            tracked: Joint::Hip,
            segment: [Joint::Hip, Joint::Knee],
            segment_height_ratio: 0.245,
            segment_range: [0.05, 0.45],
            needs_shoulder: false,
            needs_wrist: false,
            visibility_threshold: 0.5,
            side_flip_margin: 0.15,
            calibration_samples: 10,
            calibration_tolerance: 0.05,
            stability_band_inches: 1.0,
            stability_frames: 10,
            stability_secs: 0.5,
            descent_threshold_inches: 4.0,
            hysteresis_inches: 0.75,
            deep_multiplier: 2.0,
            descent_velocity: 0.002,
            ascent_velocity: 0.002,
            reversal_samples: 3,
            min_depth_inches: 6.0,
            recovery_percent: 70.0,
            max_state_secs: 8.0,
            max_tracking_loss_frames: 15,
            velocity_window: 5,
            drift_band_inches: [0.5, 2.5],
            drift_frames: 45,
            quality_bands: QualityBands {
                partial: 6.0,
                good: 9.0,
                full: 11.0,
            },
            reference_depth_inches: 12.0,
        }
    }

    pub fn press() -> Self {
        Self {
            tracked: Joint::Wrist,
            // ロックアウトで伸ばした腕（肩→手首）。肘を曲げたフレームは短すぎて弾かれる
            segment: [Joint::Shoulder, Joint::Wrist],
            segment_height_ratio: 0.332,
            segment_range: [0.08, 0.45],
            needs_shoulder: true,
            needs_wrist: true,
            visibility_threshold: 0.5,
            side_flip_margin: 0.2,
            calibration_samples: 10,
            calibration_tolerance: 0.05,
            stability_band_inches: 1.0,
            stability_frames: 8,
            stability_secs: 0.4,
            descent_threshold_inches: 3.0,
            hysteresis_inches: 0.5,
            deep_multiplier: 2.0,
            descent_velocity: 0.002,
            ascent_velocity: 0.002,
            reversal_samples: 3,
            min_depth_inches: 5.0,
            recovery_percent: 76.0,
            max_state_secs: 6.0,
            max_tracking_loss_frames: 15,
            velocity_window: 5,
            drift_band_inches: [0.5, 2.0],
            drift_frames: 45,
            quality_bands: QualityBands {
                partial: 5.0,
                good: 8.0,
                full: 11.0,
            },
            reference_depth_inches: 10.0,
        }
    }

    /// 可視性チェックの対象となる関節（重複なし）
    pub fn required_joints(&self) -> Vec<Joint> {
        let mut joints = vec![self.tracked, self.segment[0], self.segment[1]];
        if self.needs_shoulder {
            joints.push(Joint::Shoulder);
        }
        if self.needs_wrist {
            joints.push(Joint::Wrist);
        }
        let mut unique = Vec::with_capacity(joints.len());
        for j in joints {
            if !unique.contains(&j) {
                unique.push(j);
            }
        }
        unique
    }

    /// 実数の定数がすべて有限かつ非負か
    pub fn validate(&self) -> Result<()> {
        let values = [
            ("segment_height_ratio", self.segment_height_ratio),
            ("segment_range[0]", self.segment_range[0]),
            ("segment_range[1]", self.segment_range[1]),
            ("visibility_threshold", self.visibility_threshold),
            ("side_flip_margin", self.side_flip_margin),
            ("calibration_tolerance", self.calibration_tolerance),
            ("stability_band_inches", self.stability_band_inches),
            ("stability_secs", self.stability_secs),
            ("descent_threshold_inches", self.descent_threshold_inches),
            ("hysteresis_inches", self.hysteresis_inches),
            ("deep_multiplier", self.deep_multiplier),
            ("descent_velocity", self.descent_velocity),
            ("ascent_velocity", self.ascent_velocity),
            ("min_depth_inches", self.min_depth_inches),
            ("recovery_percent", self.recovery_percent),
            ("max_state_secs", self.max_state_secs),
            ("drift_band_inches[0]", self.drift_band_inches[0]),
            ("drift_band_inches[1]", self.drift_band_inches[1]),
            ("quality_bands.partial", self.quality_bands.partial),
            ("quality_bands.good", self.quality_bands.good),
            ("quality_bands.full", self.quality_bands.full),
            ("reference_depth_inches", self.reference_depth_inches),
        ];
        for (name, value) in values {
            ensure!(value.is_finite() && value >= 0.0, "{} must be finite and >= 0 (got {})", name, value);
        }
        ensure!(
            self.segment_range[0] < self.segment_range[1],
            "segment_range must be [min, max]"
        );
        ensure!(self.segment_height_ratio > 0.0, "segment_height_ratio must be > 0");
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            server: ServerConfig::default(),
            scoring: ScoringConfig::default(),
            squat: ExerciseProfile::squat(),
            press: ExerciseProfile::press(),
        }
    }
}

/// 入れ子のテーブルはキー単位で、それ以外は値ごと置き換える
fn merge_table(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        match value {
            toml::Value::Table(patch) if matches!(base.get(&key), Some(toml::Value::Table(_))) => {
                if let Some(toml::Value::Table(inner)) = base.get_mut(&key) {
                    merge_table(inner, patch);
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// デフォルトプロファイルに toml テーブルを上書きする
fn merge_profile(base: ExerciseProfile, overrides: Option<toml::Table>) -> Result<ExerciseProfile> {
    let Some(overrides) = overrides else {
        return Ok(base);
    };
    let mut table = toml::Table::try_from(&base).context("Failed to encode default profile")?;
    merge_table(&mut table, overrides);
    let profile: ExerciseProfile = table.try_into()?;
    profile.validate()?;
    Ok(profile)
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)?;
        Ok(Self {
            app: raw.app,
            server: raw.server,
            scoring: raw.scoring,
            squat: merge_profile(ExerciseProfile::squat(), raw.squat).context("[squat]")?,
            press: merge_profile(ExerciseProfile::press(), raw.press).context("[press]")?,
        })
    }

    /// 読めなければデフォルト
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("config not loaded ({:#}), using defaults", e);
                Self::default()
            }
        }
    }

    pub fn profile(&self, kind: ExerciseKind) -> &ExerciseProfile {
        match kind {
            ExerciseKind::Squat => &self.squat,
            ExerciseKind::Press => &self.press,
        }
    }
}

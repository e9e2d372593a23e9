use crate::types::Tick;
use serde::{Deserialize, Serialize};

fn default_gap_cost() -> u32 {
    2
}

fn default_wrong_pitch_cost() -> u32 {
    3
}

fn default_chord_spread_ms() -> u32 {
    50
}

fn default_marker_opacity() -> f64 {
    0.5
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

/// Tolerance for treating a model and a candidate onset as the same moment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnsetWindow {
    /// Percentage of the model's shortest positive inter-onset interval.
    Auto { percent: u32 },
    Ticks(Tick),
    /// Onset times are ignored; only pitch order is aligned.
    Unbounded,
}

impl Default for OnsetWindow {
    fn default() -> Self {
        OnsetWindow::Auto { percent: 50 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraMarkers {
    #[default]
    Anchored,
    Omit,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerColors {
    pub missing: String,
    pub wrong_pitch: String,
    pub extra: String,
}

impl Default for MarkerColors {
    fn default() -> Self {
        Self {
            missing: "#e53935".to_string(),
            wrong_pitch: "#fb8c00".to_string(),
            extra: "#1e88e5".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDto {
    pub onset_window: OnsetWindow,
    #[serde(default = "default_gap_cost")]
    pub gap_cost: u32,
    #[serde(default = "default_wrong_pitch_cost")]
    pub wrong_pitch_cost: u32,
    #[serde(default = "default_chord_spread_ms")]
    pub chord_spread_ms: u32,
    pub normalize_tempo: bool,
    pub filter_velocity: Option<u8>,
    pub filter_duration_ms: Option<u32>,
    pub filter_pitch_margin: Option<u8>,
    pub extras: ExtraMarkers,
    pub colors: MarkerColors,
    #[serde(default = "default_marker_opacity")]
    pub marker_opacity: f64,
}

impl Default for SettingsDto {
    fn default() -> Self {
        Self {
            onset_window: OnsetWindow::default(),
            gap_cost: default_gap_cost(),
            wrong_pitch_cost: default_wrong_pitch_cost(),
            chord_spread_ms: default_chord_spread_ms(),
            normalize_tempo: false,
            filter_velocity: None,
            filter_duration_ms: None,
            filter_pitch_margin: None,
            extras: ExtraMarkers::default(),
            colors: MarkerColors::default(),
            marker_opacity: default_marker_opacity(),
        }
    }
}

pub trait StoragePort: Send + Sync {
    fn load_settings(&self) -> Result<SettingsDto, StorageError>;
    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError>;
}

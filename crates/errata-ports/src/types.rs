use serde::{Deserialize, Serialize};
use std::fmt;

pub type Tick = i64; // musical time, monotonic within a voice
pub type Pitch = u8; // MIDI key number, compared exactly
pub type PageIndex = usize;

/// Axis-aligned rectangle in crop-relative page points, y axis pointing up.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            min_x: self.min_x + dx,
            min_y: self.min_y + dy,
            max_x: self.max_x + dx,
            max_y: self.max_y + dy,
        }
    }

    pub fn union(&self, other: &Rect) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Touching edges count as overlap.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StaffId(pub String);

impl StaffId {
    pub const UNNAMED: &'static str = "unnamed-staff";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn unnamed() -> Self {
        Self(Self::UNNAMED.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Join key between a notated glyph and its note-log entry.
///
/// Only the boundary readers build keys; everything downstream compares them
/// and nothing more.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CrossRefKey(String);

impl CrossRefKey {
    pub fn from_location(line: u32, column: u32) -> Self {
        Self(format!("{line}:{column}"))
    }
}

impl fmt::Display for CrossRefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const PITCH_NAMES: [&str; 12] = [
    "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];

/// Scientific pitch name, e.g. 60 -> "C4".
pub fn pitch_name(pitch: Pitch) -> String {
    let octave = pitch as i32 / 12 - 1;
    format!("{}{}", PITCH_NAMES[(pitch % 12) as usize], octave)
}

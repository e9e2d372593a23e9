//! Reader for the per-staff note-event log written by the engraver's event
//! listener. Only `note` records are kept:
//!
//! ```text
//! moment	note	pitch	duration	velocity	point-and-click COL LINE[	voice]
//! ```

use errata_ports::types::{CrossRefKey, Pitch, StaffId, Tick};
use std::path::Path;

const DEFAULT_VOICE: &str = "1";

#[derive(thiserror::Error, Debug)]
pub enum NoteLogError {
    #[error("io error: {0}")]
    Io(String),
    #[error("{staff} line {line}: {message}")]
    Parse {
        staff: StaffId,
        line: usize,
        message: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    /// Symbolic tick, only meaningful for ordering within this log.
    pub tick: Tick,
    pub pitch: Pitch,
    pub voice: String,
    pub key: CrossRefKey,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteLog {
    pub staff: StaffId,
    pub entries: Vec<LogEntry>,
}

/// Staff id from a log file name: `soprano.notes` -> `soprano`.
pub fn staff_from_path(path: &Path) -> StaffId {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(StaffId::new)
        .unwrap_or_else(StaffId::unnamed)
}

pub fn read_note_log_path(path: &Path, ppq: u16) -> Result<NoteLog, NoteLogError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| NoteLogError::Io(format!("{}: {}", path.display(), e)))?;
    parse_note_log(staff_from_path(path), &text, ppq)
}

pub fn parse_note_log(staff: StaffId, text: &str, ppq: u16) -> Result<NoteLog, NoteLogError> {
    let mut entries = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let items: Vec<&str> = line.split('\t').map(str::trim).collect();
        if items.len() < 6 || items[1] != "note" {
            continue;
        }
        let err = |message: String| NoteLogError::Parse {
            staff: staff.clone(),
            line: line_no,
            message,
        };

        let tick = parse_moment(items[0], ppq).ok_or_else(|| err(format!("invalid moment {:?}", items[0])))?;
        let pitch = items[2]
            .parse::<Pitch>()
            .ok()
            .filter(|p| *p < 128)
            .ok_or_else(|| err(format!("invalid pitch {:?}", items[2])))?;
        let key = parse_point_and_click(items[5])
            .ok_or_else(|| err(format!("invalid point-and-click field {:?}", items[5])))?;
        let voice = items
            .get(6)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .unwrap_or_else(|| DEFAULT_VOICE.to_string());

        entries.push(LogEntry {
            tick,
            pitch,
            voice,
            key,
        });
    }

    Ok(NoteLog { staff, entries })
}

/// Whole-note moment to ticks; `main-grace` places a grace note before `main`.
fn parse_moment(field: &str, ppq: u16) -> Option<Tick> {
    let (main, grace) = match field.split_once('-') {
        Some((main, grace)) if !main.is_empty() => (main, Some(grace)),
        _ => (field, None),
    };
    let mut whole_notes = parse_number(main)?;
    if let Some(grace) = grace {
        whole_notes -= parse_number(grace)?;
    }
    Some((whole_notes * 4.0 * ppq as f64).round() as Tick)
}

fn parse_number(field: &str) -> Option<f64> {
    match field.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f64>().ok()?;
            let den = den.parse::<f64>().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => field.parse::<f64>().ok(),
    }
    .filter(|v| v.is_finite())
}

fn parse_point_and_click(field: &str) -> Option<CrossRefKey> {
    match field.split_whitespace().collect::<Vec<_>>().as_slice() {
        ["point-and-click", column, line] => Some(CrossRefKey::from_location(
            line.parse().ok()?,
            column.parse().ok()?,
        )),
        _ => None,
    }
}

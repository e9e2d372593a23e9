use crate::types::StaffId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    UnresolvedCrossReference,
    OnsetCountMismatch,
    ChordPitchMismatch,
    UnrenderableMistake,
    CropExcluded,
    DanglingNote,
    ZeroDuration,
}

/// A condition the run recovered from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub staff: Option<StaffId>,
    pub detail: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.staff {
            Some(staff) => write!(f, "{:?} [{}]: {}", self.kind, staff, self.detail),
            None => write!(f, "{:?}: {}", self.kind, self.detail),
        }
    }
}

/// Collects warnings across stages so they can be surfaced once per run.
#[derive(Clone, Debug, Default)]
pub struct Warnings {
    items: Vec<Warning>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: WarningKind, staff: Option<&StaffId>, detail: impl Into<String>) {
        self.items.push(Warning {
            kind,
            staff: staff.cloned(),
            detail: detail.into(),
        });
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.items.iter().filter(|w| w.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.items.iter()
    }
}

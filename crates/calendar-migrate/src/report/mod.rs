//! Per-item failure collection and the end-of-job summary.
//!
//! Entries only accumulate during a job. They are shown once, grouped by
//! record type, when the job completes.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::core::RecordType;

/// One foreign item that could not be migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub record_type: RecordType,
    pub foreign_id: i64,
    pub display_name: String,
}

/// One line of the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLine {
    pub id: i64,
    pub label: String,
    pub name: String,
}

/// Failures for one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorGroup {
    pub record_type: RecordType,
    pub errors: Vec<ErrorLine>,
}

/// Append-only collection of failed items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorReporter {
    entries: Vec<ErrorEntry>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a reporter from persisted entries.
    pub fn from_entries(entries: Vec<ErrorEntry>) -> Self {
        Self { entries }
    }

    /// Append a failure. Returns `false` if the item is already logged.
    pub fn log(
        &mut self,
        record_type: RecordType,
        foreign_id: i64,
        display_name: impl Into<String>,
    ) -> bool {
        if self.contains(record_type, foreign_id) {
            return false;
        }
        self.entries.push(ErrorEntry {
            record_type,
            foreign_id,
            display_name: display_name.into(),
        });
        true
    }

    pub fn contains(&self, record_type: RecordType, foreign_id: i64) -> bool {
        self.entries
            .iter()
            .any(|e| e.record_type == record_type && e.foreign_id == foreign_id)
    }

    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries grouped by record type, in migration order. Types without
    /// failures are omitted.
    pub fn summary(&self) -> Vec<ErrorGroup> {
        let mut groups: BTreeMap<RecordType, Vec<ErrorLine>> = BTreeMap::new();
        for entry in &self.entries {
            groups.entry(entry.record_type).or_default().push(ErrorLine {
                id: entry.foreign_id,
                label: entry.record_type.label().to_string(),
                name: entry.display_name.clone(),
            });
        }
        groups
            .into_iter()
            .map(|(record_type, errors)| ErrorGroup {
                record_type,
                errors,
            })
            .collect()
    }

    /// Plain-text rendering of [`summary`](Self::summary). Empty when nothing
    /// failed.
    pub fn render(&self) -> String {
        render_summary(&self.summary())
    }
}

/// Render grouped failures as text.
pub fn render_summary(groups: &[ErrorGroup]) -> String {
    if groups.is_empty() {
        return String::new();
    }

    let mut out = String::from("The following items could not be migrated:\n");
    for group in groups {
        let _ = write!(out, "\n{} ({}):\n", group.record_type, group.errors.len());
        for line in &group.errors {
            let _ = writeln!(out, "  - {} #{}: {}", line.label, line.id, line.name);
        }
    }
    out
}

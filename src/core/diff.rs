//! Before/after field diffs for `--diff`

use crate::domain::{display_value, BeltError, FieldMap, Record, Result};
use serde_json::Value;

/// Original field values captured before a record was handled
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    values: FieldMap,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }
}

/// One changed field
#[derive(Debug, Clone, PartialEq)]
pub struct DiffRow {
    pub field: String,
    pub original: Value,
    pub updated: Value,
}

impl DiffRow {
    /// Table cells: field, original, updated
    pub fn cells(&self) -> Vec<String> {
        vec![
            self.field.clone(),
            display_value(&self.original),
            display_value(&self.updated),
        ]
    }
}

/// Captures and renders per-record field changes
#[derive(Debug, Clone, Copy)]
pub struct DiffReporter {
    enabled: bool,
}

impl DiffReporter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Snapshot the record's original values. Empty when diffing is off; a
    /// misconfiguration when diffing is on and the record has no change
    /// tracking.
    pub fn capture_before<R: Record + ?Sized>(&self, record: &R, row_name: &str) -> Result<Snapshot> {
        if !self.enabled {
            return Ok(Snapshot::default());
        }

        let tracked = record
            .change_tracking()
            .ok_or_else(|| unsupported(row_name))?;

        Ok(Snapshot {
            values: tracked.original_values(),
        })
    }

    /// Changed fields with their value before handling and after
    pub fn render_diff<R: Record + ?Sized>(
        &self,
        record: &R,
        before: &Snapshot,
        row_name: &str,
    ) -> Result<Vec<DiffRow>> {
        let tracked = record
            .change_tracking()
            .ok_or_else(|| unsupported(row_name))?;

        Ok(tracked
            .changed_values()
            .into_iter()
            .map(|(field, updated)| DiffRow {
                original: before.get(&field).cloned().unwrap_or(Value::Null),
                field,
                updated,
            })
            .collect())
    }
}

fn unsupported(row_name: &str) -> BeltError {
    BeltError::Misconfigured(format!(
        "The --diff flag requires records with change tracking, and {row_name} records do not support it"
    ))
}

//! Records yielded by data sources
//!
//! The runner treats records as opaque values. It only needs two things from
//! them: a human-readable identity for failure reports, and, when `--diff` is
//! requested, a change-tracking view.

use serde_json::Value;
use std::collections::BTreeMap;

/// Field name to value map used by change tracking
pub type FieldMap = BTreeMap<String, Value>;

/// A unit of work handed to a command's row handler
pub trait Record {
    /// Identity rendering used when the record is reported in a failure
    fn describe(&self) -> String;

    /// Change-tracking view of this record, if the record type supports it
    fn change_tracking(&self) -> Option<&dyn ChangeTracked> {
        None
    }
}

/// Records that can report their original and changed field values
pub trait ChangeTracked {
    /// Field values as they were when the record was fetched or last synced
    fn original_values(&self) -> FieldMap;

    /// Fields whose values changed, with their new values
    fn changed_values(&self) -> FieldMap;
}

/// A row of named fields with change tracking
///
/// `set` makes a field dirty. `sync_changes` marks the dirty fields as
/// persisted: they move into the change set and the original snapshot is
/// brought up to date, the way an ORM model behaves after a save.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedRow {
    attributes: FieldMap,
    original: FieldMap,
    changes: FieldMap,
    key: Option<String>,
}

impl TrackedRow {
    /// Create a row from fetched attributes
    pub fn new(attributes: FieldMap) -> Self {
        Self {
            original: attributes.clone(),
            attributes,
            changes: FieldMap::new(),
            key: None,
        }
    }

    /// Create a row from a JSON object; any other JSON value is a `None`
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::new(map.into_iter().collect())),
            _ => None,
        }
    }

    /// Name the field that identifies this row in reports
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Name of the identifying field, if set
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(field.into(), value.into());
    }

    pub fn attributes(&self) -> &FieldMap {
        &self.attributes
    }

    /// Fields whose current value differs from the original snapshot
    pub fn dirty(&self) -> FieldMap {
        self.attributes
            .iter()
            .filter(|(field, value)| self.original.get(*field) != Some(*value))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty().is_empty()
    }

    /// Mark all dirty fields as persisted
    pub fn sync_changes(&mut self) {
        self.changes = self.dirty();
        self.original = self.attributes.clone();
    }
}

impl Record for TrackedRow {
    fn describe(&self) -> String {
        let identity = self
            .key
            .as_deref()
            .and_then(|key| self.attributes.get(key).map(|value| (key, value)));

        match identity {
            Some((key, value)) => format!("{key}={}", display_value(value)),
            None => Value::Object(self.attributes.clone().into_iter().collect()).to_string(),
        }
    }

    fn change_tracking(&self) -> Option<&dyn ChangeTracked> {
        Some(self)
    }
}

impl ChangeTracked for TrackedRow {
    fn original_values(&self) -> FieldMap {
        self.original.clone()
    }

    fn changed_values(&self) -> FieldMap {
        let mut changed = self.changes.clone();
        changed.extend(self.dirty());
        changed
    }
}

impl Record for Value {
    fn describe(&self) -> String {
        self.to_string()
    }
}

impl Record for String {
    fn describe(&self) -> String {
        self.clone()
    }
}

/// Render a field value for display: strings without quotes, everything else
/// as JSON
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row() -> TrackedRow {
        TrackedRow::from_json(json!({"id": 1, "name": "Chris Morrell"}))
            .unwrap()
            .with_key("id")
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(TrackedRow::from_json(json!([1, 2])).is_none());
        assert!(TrackedRow::from_json(json!("text")).is_none());
    }

    #[test]
    fn test_dirty_tracking() {
        let mut row = row();
        assert!(!row.is_dirty());

        row.set("name", "Bogdan Kharchenko");
        assert_eq!(row.dirty().get("name"), Some(&json!("Bogdan Kharchenko")));

        // Setting a field back to its original value is not a change
        row.set("name", "Chris Morrell");
        assert!(!row.is_dirty());
    }

    #[test]
    fn test_sync_changes_moves_dirty_into_changes() {
        let mut row = row();
        row.set("name", "Taylor Otwell");
        row.sync_changes();

        assert!(!row.is_dirty());
        assert_eq!(row.original_values().get("name"), Some(&json!("Taylor Otwell")));
        assert_eq!(row.changed_values().get("name"), Some(&json!("Taylor Otwell")));
        assert!(!row.changed_values().contains_key("id"));
    }

    #[test]
    fn test_describe_uses_key() {
        assert_eq!(row().describe(), "id=1");

        let keyless = TrackedRow::from_json(json!({"a": "b"})).unwrap();
        assert_eq!(keyless.describe(), r#"{"a":"b"}"#);
    }

    #[test]
    fn test_plain_values_have_no_change_tracking() {
        assert!(json!(1).change_tracking().is_none());
        assert!("x".to_string().change_tracking().is_none());
        assert!(row().change_tracking().is_some());
    }
}

//! `json` command
//!
//! Walks the objects of a JSON array, failing each one that lacks a required
//! field and filling defaults into the rest. With `--output` the processed
//! objects are written out as a new array once the run finishes.

use crate::cli::BeltFlags;
use crate::config::{load_config_or_default, BeltConfig};
use crate::core::query_log::QueryLog;
use crate::core::runner::{BatchCommand, BatchRunner};
use crate::core::source::json::JsonFileSource;
use crate::core::source::DataSource;
use crate::domain::{BeltError, Result, TrackedRow};
use async_trait::async_trait;
use clap::Args;
use serde_json::Value;
use std::path::PathBuf;

/// Arguments for the json command
#[derive(Args, Debug)]
pub struct JsonArgs {
    /// JSON file holding an array of objects
    pub file: PathBuf,

    /// JSON pointer to the array inside the document (e.g. /data/users)
    #[arg(long)]
    pub pointer: Option<String>,

    /// Field identifying a record in failure reports
    #[arg(long)]
    pub key: Option<String>,

    /// Field every record must have with a non-null value
    #[arg(long = "require", value_name = "FIELD", value_delimiter = ',')]
    pub required: Vec<String>,

    /// Value for a field that is missing or null, as FIELD=VALUE (JSON or text)
    #[arg(long = "default", value_name = "FIELD=VALUE", value_parser = parse_default)]
    pub defaults: Vec<(String, Value)>,

    /// Write the processed records to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep going after a record fails and report all failures at the end
    #[arg(long)]
    pub collect_exceptions: bool,

    /// Records handled per chunk (defaults to belt.chunk_size)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Singular noun used in messages
    #[arg(long, default_value = "record")]
    pub row_name: String,

    #[command(flatten)]
    pub flags: BeltFlags,
}

impl JsonArgs {
    /// Execute the json command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(file = %self.file.display(), "Starting JSON run");

        let config = match load_config_or_default(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Configuration error: {e}");
                return Ok(2);
            }
        };

        let command = JsonCommand::new(self, &config.belt);
        let mut runner = BatchRunner::new(command, self.flags.run_config());
        Ok(runner.run().await)
    }
}

/// Parse `FIELD=VALUE`; the value is JSON when it parses as JSON, text otherwise
pub fn parse_default(input: &str) -> std::result::Result<(String, Value), String> {
    let (field, raw) = input
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{input}'"))?;

    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{input}'"));
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((field.to_string(), value))
}

/// Validates and normalizes the objects of one JSON file
pub struct JsonCommand {
    file: PathBuf,
    pointer: Option<String>,
    key: Option<String>,
    required: Vec<String>,
    defaults: Vec<(String, Value)>,
    output: Option<PathBuf>,
    processed: Vec<Value>,
    row_name: String,
    collect_exceptions: bool,
    chunk_size: usize,
}

impl JsonCommand {
    pub fn new(args: &JsonArgs, belt: &BeltConfig) -> Self {
        Self {
            file: args.file.clone(),
            pointer: args.pointer.clone(),
            key: args.key.clone(),
            required: args.required.clone(),
            defaults: args.defaults.clone(),
            output: args.output.clone(),
            processed: Vec::new(),
            row_name: args.row_name.clone(),
            collect_exceptions: args.collect_exceptions || belt.collect_exceptions,
            chunk_size: args.chunk_size.unwrap_or(belt.chunk_size),
        }
    }

    /// Records handled successfully so far
    pub fn processed(&self) -> &[Value] {
        &self.processed
    }
}

#[async_trait]
impl BatchCommand for JsonCommand {
    type Record = TrackedRow;

    async fn before_first_row(&mut self) -> Result<()> {
        self.processed.clear();
        Ok(())
    }

    async fn query(&mut self, _log: &QueryLog) -> Result<Box<dyn DataSource<TrackedRow>>> {
        let mut source = JsonFileSource::new(&self.file);
        if let Some(ref pointer) = self.pointer {
            source = source.with_pointer(pointer.clone());
        }
        if let Some(ref key) = self.key {
            source = source.with_key(key.clone());
        }
        Ok(Box::new(source))
    }

    async fn handle_row(&mut self, record: &mut TrackedRow) -> anyhow::Result<()> {
        let missing: Vec<&str> = self
            .required
            .iter()
            .filter(|field| record.get(field).map_or(true, Value::is_null))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            anyhow::bail!("Missing required field(s): {}", missing.join(", "));
        }

        for (field, value) in &self.defaults {
            if record.get(field).map_or(true, Value::is_null) {
                record.set(field.clone(), value.clone());
            }
        }
        record.sync_changes();

        if self.output.is_some() {
            self.processed
                .push(Value::Object(record.attributes().clone().into_iter().collect()));
        }
        Ok(())
    }

    async fn after_last_row(&mut self) -> Result<()> {
        let Some(ref output) = self.output else {
            return Ok(());
        };

        let contents = serde_json::to_string_pretty(&self.processed)?;
        tokio::fs::write(output, contents).await.map_err(|e| {
            BeltError::Io(format!("Failed to write {}: {}", output.display(), e))
        })?;

        tracing::info!(
            path = %output.display(),
            records = self.processed.len(),
            "Wrote processed records"
        );
        Ok(())
    }

    fn row_name(&self) -> String {
        self.row_name.clone()
    }

    fn collect_exceptions(&self) -> bool {
        self.collect_exceptions
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn command(required: &[&str], defaults: Vec<(String, Value)>) -> JsonCommand {
        JsonCommand {
            file: PathBuf::from("unused.json"),
            pointer: None,
            key: None,
            required: required.iter().map(|s| s.to_string()).collect(),
            defaults,
            output: None,
            processed: Vec::new(),
            row_name: "record".to_string(),
            collect_exceptions: false,
            chunk_size: 10,
        }
    }

    #[test_case("active=true", "active", json!(true) ; "json boolean")]
    #[test_case("limit=10", "limit", json!(10) ; "json number")]
    #[test_case("role=member", "role", json!("member") ; "bare text")]
    #[test_case("note=a=b", "note", json!("a=b") ; "equals in value")]
    fn test_parse_default(input: &str, field: &str, value: Value) {
        assert_eq!(parse_default(input).unwrap(), (field.to_string(), value));
    }

    #[test_case("no-equals" ; "missing separator")]
    #[test_case("=value" ; "missing field")]
    fn test_parse_default_rejects(input: &str) {
        assert!(parse_default(input).is_err());
    }

    #[tokio::test]
    async fn test_missing_required_fields_fail_the_record() {
        let mut command = command(&["email", "name"], Vec::new());
        let mut record = TrackedRow::from_json(json!({"email": null, "id": 1})).unwrap();

        let err = command.handle_row(&mut record).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing required field(s): email, name");
    }

    #[tokio::test]
    async fn test_defaults_fill_missing_and_null_fields() {
        let mut command = command(
            &[],
            vec![
                ("role".to_string(), json!("member")),
                ("active".to_string(), json!(true)),
            ],
        );
        let mut record = TrackedRow::from_json(json!({"role": "admin", "active": null})).unwrap();

        command.handle_row(&mut record).await.unwrap();
        assert_eq!(record.get("role"), Some(&json!("admin")));
        assert_eq!(record.get("active"), Some(&json!(true)));
        assert!(!record.is_dirty());
    }
}

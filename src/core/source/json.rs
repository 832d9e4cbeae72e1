//! JSON file data source
//!
//! Reads a JSON document whose root, or the location named by a JSON pointer,
//! is an array of objects. Every object becomes a [`TrackedRow`]. The file is
//! read on first use so that constructing the source is free.

use super::{Chunk, DataSource};
use crate::domain::{BeltError, Result, TrackedRow};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Iterates the objects of a JSON array stored in a file
pub struct JsonFileSource {
    path: PathBuf,
    pointer: Option<String>,
    key: Option<String>,
    loaded: Option<Loaded>,
}

struct Loaded {
    rows: VecDeque<TrackedRow>,
    total: u64,
    chunks_fetched: usize,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            pointer: None,
            key: None,
            loaded: None,
        }
    }

    /// Read the array at a JSON pointer (e.g. `/data/users`) instead of the root
    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.pointer = Some(pointer.into());
        self
    }

    /// Field used to identify rows in failure reports
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    async fn load(&mut self) -> Result<&mut Loaded> {
        if self.loaded.is_none() {
            let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
                BeltError::Source(format!("Failed to read {}: {}", self.path.display(), e))
            })?;
            let rows = parse_rows(&contents, self.pointer.as_deref(), self.key.as_deref())?;

            tracing::debug!(
                path = %self.path.display(),
                rows = rows.len(),
                "Loaded JSON records"
            );

            self.loaded = Some(Loaded {
                total: rows.len() as u64,
                rows: rows.into(),
                chunks_fetched: 0,
            });
        }

        self.loaded
            .as_mut()
            .ok_or_else(|| BeltError::Source("JSON records were not loaded".to_string()))
    }
}

fn parse_rows(contents: &str, pointer: Option<&str>, key: Option<&str>) -> Result<Vec<TrackedRow>> {
    let document: Value = serde_json::from_str(contents)?;

    let items = match pointer {
        Some(pointer) => document.pointer(pointer).ok_or_else(|| {
            BeltError::Misconfigured(format!("JSON pointer '{pointer}' does not exist"))
        })?,
        None => &document,
    };

    let Value::Array(items) = items else {
        return Err(BeltError::Misconfigured(
            "JSON source must point at an array of objects".to_string(),
        ));
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let row = TrackedRow::from_json(item.clone()).ok_or_else(|| {
                BeltError::Source(format!("Element {index} of the JSON array is not an object"))
            })?;
            Ok(match key {
                Some(key) => row.with_key(key),
                None => row,
            })
        })
        .collect()
}

#[async_trait]
impl DataSource<TrackedRow> for JsonFileSource {
    async fn count(&mut self) -> Result<u64> {
        Ok(self.load().await?.total)
    }

    async fn next_chunk(&mut self, chunk_size: usize) -> Result<Option<Chunk<TrackedRow>>> {
        if chunk_size == 0 {
            return Err(BeltError::Misconfigured(
                "Chunk size must be greater than zero".to_string(),
            ));
        }

        let loaded = self.load().await?;
        if loaded.rows.is_empty() {
            return Ok(None);
        }

        let take = chunk_size.min(loaded.rows.len());
        let rows: Vec<TrackedRow> = loaded.rows.drain(..take).collect();
        let chunk = Chunk::new(loaded.chunks_fetched, rows);
        loaded.chunks_fetched += 1;

        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Record;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_json(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_reads_root_array() {
        let file = write_json(r#"[{"id": 1}, {"id": 2}, {"id": 3}]"#);
        let mut source = JsonFileSource::new(file.path()).with_key("id");

        assert_eq!(source.count().await.unwrap(), 3);
        let chunk = source.next_chunk(2).await.unwrap().unwrap();
        assert_eq!(chunk.len(), 2);
        assert_eq!(chunk.records()[0].describe(), "id=1");

        let chunk = source.next_chunk(2).await.unwrap().unwrap();
        assert_eq!(chunk.records()[0].describe(), "id=3");
        assert!(source.next_chunk(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reads_array_at_pointer() {
        let file = write_json(r#"{"data": {"users": [{"name": "Mohamed Said"}]}}"#);
        let mut source = JsonFileSource::new(file.path()).with_pointer("/data/users");
        assert_eq!(source.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_pointer_is_misconfigured() {
        let file = write_json(r#"{"data": []}"#);
        let mut source = JsonFileSource::new(file.path()).with_pointer("/users");
        let err = source.count().await.unwrap_err();
        assert!(err.is_misconfiguration());
    }

    #[tokio::test]
    async fn test_non_array_is_misconfigured() {
        let file = write_json(r#"{"id": 1}"#);
        let mut source = JsonFileSource::new(file.path());
        assert!(source.count().await.unwrap_err().is_misconfiguration());
    }

    #[tokio::test]
    async fn test_non_object_element_is_source_error() {
        let file = write_json(r#"[{"id": 1}, 2]"#);
        let mut source = JsonFileSource::new(file.path());
        assert!(matches!(
            source.count().await.unwrap_err(),
            BeltError::Source(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_source_error() {
        let mut source = JsonFileSource::new("/definitely/not/here.json");
        assert!(matches!(
            source.next_chunk(10).await.unwrap_err(),
            BeltError::Source(_)
        ));
    }
}

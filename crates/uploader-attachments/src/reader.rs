//! Record reading
//!
//! The coordinator re-reads stored attachment values from the host's record
//! store when staging deletes. The host implements [`RecordReader`] over its
//! persistence layer.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use uploader_core::{FieldValue, Id, RecordData, UploadResult};

/// Reads persisted field values of a record
pub trait RecordReader: Send + Sync {
    /// Read `fields` of the record `model`/`id`.
    ///
    /// Missing records and fields are simply absent from the result.
    fn read_fields(&self, model: &str, id: Id, fields: &[String]) -> UploadResult<RecordData>;
}

/// In-memory record store for testing
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<(String, Id), RecordData>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a persisted record
    pub fn insert(&self, model: impl Into<String>, id: Id, data: RecordData) {
        self.records.write().insert((model.into(), id), data);
    }

    /// Set one persisted field
    pub fn set_field(&self, model: &str, id: Id, field: &str, value: impl Into<FieldValue>) {
        self.records
            .write()
            .entry((model.to_string(), id))
            .or_default()
            .insert(field, value);
    }

    pub fn get(&self, model: &str, id: Id) -> Option<RecordData> {
        self.records.read().get(&(model.to_string(), id)).cloned()
    }

    pub fn remove(&self, model: &str, id: Id) -> Option<RecordData> {
        self.records.write().remove(&(model.to_string(), id))
    }
}

impl RecordReader for MemoryRecordStore {
    fn read_fields(&self, model: &str, id: Id, fields: &[String]) -> UploadResult<RecordData> {
        let records = self.records.read();
        let Some(record) = records.get(&(model.to_string(), id)) else {
            return Ok(RecordData::default());
        };

        Ok(fields
            .iter()
            .filter_map(|field| record.get(field).map(|value| (field.clone(), value.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_selected_fields() {
        let store = MemoryRecordStore::new();
        store.set_field("Image", 1, "file", "cat.png");
        store.set_field("Image", 1, "title", "Cat");

        let data = store
            .read_fields("Image", 1, &["file".to_string(), "avatar".to_string()])
            .unwrap();

        assert_eq!(data.get("file").and_then(FieldValue::as_str), Some("cat.png"));
        assert!(!data.contains("title"));
        assert!(!data.contains("avatar"));
    }

    #[test]
    fn test_read_missing_record() {
        let store = MemoryRecordStore::new();
        let data = store.read_fields("Image", 9, &["file".to_string()]).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_remove_record() {
        let store = MemoryRecordStore::new();
        store.set_field("Image", 2, "file", "a.png");
        assert!(store.remove("Image", 2).is_some());
        assert!(store.get("Image", 2).is_none());
    }
}

//! Record-side types shared by the lifecycle crates
//!
//! The host hands the coordinator a [`Record`]: a model name, an optional
//! primary key, and the outgoing field data. Attachment fields hold either an
//! [`UploadedFile`] or a plain stored value (usually the stored file name).

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primary key type
pub type Id = i64;

/// An uploaded (or remotely fetched) file waiting in a temporary location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Client-supplied file name, e.g. `My Photo.JPG`
    pub name: String,
    /// Temporary location of the file contents
    pub tmp_path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Declared MIME type
    pub content_type: String,
    /// True when the file was fetched from a URL instead of uploaded
    #[serde(default)]
    pub remote: bool,
}

impl UploadedFile {
    pub fn new(
        name: impl Into<String>,
        tmp_path: impl Into<PathBuf>,
        size: u64,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            tmp_path: tmp_path.into(),
            size,
            content_type: content_type.into(),
            remote: false,
        }
    }

    /// Mark as fetched from a remote URL
    pub fn remote(mut self) -> Self {
        self.remote = true;
        self
    }

    /// No temp file was supplied (an empty upload slot)
    pub fn is_empty(&self) -> bool {
        self.tmp_path.as_os_str().is_empty()
    }

    /// The temp file is present on disk
    pub fn exists(&self) -> bool {
        !self.is_empty() && self.tmp_path.is_file()
    }
}

/// A value held by one record field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Upload(UploadedFile),
    Value(Value),
}

impl FieldValue {
    pub fn as_upload(&self) -> Option<&UploadedFile> {
        match self {
            FieldValue::Upload(file) => Some(file),
            FieldValue::Value(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Value(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Loosely "empty": null, false, zero, `""`, `"0"`, empty collections, or
    /// an upload slot without a temp file.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Upload(file) => file.is_empty(),
            FieldValue::Value(value) => match value {
                Value::Null => true,
                Value::Bool(b) => !b,
                Value::Number(n) => n.as_f64() == Some(0.0),
                Value::String(s) => s.is_empty() || s == "0",
                Value::Array(a) => a.is_empty(),
                Value::Object(o) => o.is_empty(),
            },
        }
    }

    /// The stored file name, if this field holds one
    pub fn stored_filename(&self) -> Option<&str> {
        if self.is_blank() {
            return None;
        }
        self.as_str()
    }
}

impl From<UploadedFile> for FieldValue {
    fn from(file: UploadedFile) -> Self {
        FieldValue::Upload(file)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Value(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Value(Value::String(value.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Value(Value::String(value))
    }
}

/// Outgoing field data of one record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordData {
    fields: BTreeMap<String, FieldValue>,
}

impl RecordData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for RecordData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A host record passing through a save or delete
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Model name, e.g. `Image` or `BlogPost`
    pub model: String,
    /// Primary key; `None` until the record has been inserted
    pub id: Option<Id>,
    /// Outgoing field data
    pub data: RecordData,
}

impl Record {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            id: None,
            data: RecordData::new(),
        }
    }

    pub fn with_id(mut self, id: Id) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.data.insert(field, value);
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_values() {
        assert!(FieldValue::Value(Value::Null).is_blank());
        assert!(FieldValue::from("").is_blank());
        assert!(FieldValue::from("0").is_blank());
        assert!(FieldValue::Value(json!(0)).is_blank());
        assert!(FieldValue::Value(json!([])).is_blank());
        assert!(FieldValue::from(UploadedFile::new("a.png", "", 0, "image/png")).is_blank());

        assert!(!FieldValue::from("photo.jpg").is_blank());
        assert!(!FieldValue::Value(json!(12)).is_blank());
    }

    #[test]
    fn test_stored_filename() {
        assert_eq!(FieldValue::from("old.jpg").stored_filename(), Some("old.jpg"));
        assert_eq!(FieldValue::from("").stored_filename(), None);
        assert_eq!(FieldValue::Value(json!(42)).stored_filename(), None);
        let upload = UploadedFile::new("a.png", "/tmp/a", 1, "image/png");
        assert_eq!(FieldValue::from(upload).stored_filename(), None);
    }

    #[test]
    fn test_record_builder() {
        let record = Record::new("Image")
            .with_id(7)
            .with_field("file", "photo.jpg")
            .with_field("title", json!("Holiday"));

        assert!(record.is_persisted());
        assert_eq!(record.data.get("file").and_then(FieldValue::as_str), Some("photo.jpg"));
        assert!(record.data.contains("title"));
        assert!(!Record::new("Image").is_persisted());
    }

    #[test]
    fn test_upload_deserializes_from_json() {
        let value: FieldValue = serde_json::from_value(json!({
            "name": "cat.png",
            "tmp_path": "/tmp/php123",
            "size": 512,
            "content_type": "image/png"
        }))
        .unwrap();

        let upload = value.as_upload().unwrap();
        assert_eq!(upload.name, "cat.png");
        assert!(!upload.remote);

        let plain: FieldValue = serde_json::from_value(json!("cat.png")).unwrap();
        assert_eq!(plain.as_str(), Some("cat.png"));
    }
}

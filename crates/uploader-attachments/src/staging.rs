//! Per-transaction staging
//!
//! An [`UploadTransaction`] belongs to exactly one record save or delete. The
//! host creates one per request and passes it to every coordinator call, so
//! concurrent requests never share staged operations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use uploader_core::inflector::slug;
use uploader_core::{Id, UploadedFile};

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    Idle,
    Staged,
    Committed,
    Failed,
}

/// A file waiting to be moved into place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub field: String,
    /// Temporary location of the upload
    pub tmp_path: PathBuf,
    /// URL-safe file name to store
    pub filename: String,
    pub size: u64,
    pub content_type: String,
    /// Fetched from a URL rather than uploaded
    pub remote: bool,
}

impl PendingWrite {
    pub fn from_upload(field: impl Into<String>, upload: &UploadedFile) -> Self {
        Self {
            field: field.into(),
            tmp_path: upload.tmp_path.clone(),
            filename: sanitize_filename(&upload.name),
            size: upload.size,
            content_type: upload.content_type.clone(),
            remote: upload.remote,
        }
    }
}

/// A stored file (and its derivatives) to remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete {
    pub field: String,
    /// Stored file name as recorded on the record
    pub filename: String,
    /// Id of the record owning the file
    pub id: Id,
}

/// Staged writes and deletes of one record transaction
#[derive(Debug, Clone, Default)]
pub struct UploadTransaction {
    state: TransactionState,
    writes: BTreeMap<String, PendingWrite>,
    deletes: BTreeMap<String, PendingDelete>,
    downscale: BTreeMap<String, u32>,
}

impl UploadTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Drop everything staged and return to `Idle`
    pub fn reset(&mut self) {
        self.writes.clear();
        self.deletes.clear();
        self.downscale.clear();
        self.state = TransactionState::Idle;
    }

    pub fn stage_write(&mut self, write: PendingWrite) {
        self.writes.insert(write.field.clone(), write);
        self.state = TransactionState::Staged;
    }

    pub fn stage_delete(&mut self, delete: PendingDelete) {
        self.deletes.insert(delete.field.clone(), delete);
        self.state = TransactionState::Staged;
    }

    /// Ask for the primary file of `field` to be downscaled to `max_width`
    /// before styles are generated
    pub fn request_downscale(&mut self, field: impl Into<String>, max_width: u32) {
        self.downscale.insert(field.into(), max_width);
    }

    pub fn downscale_for(&self, field: &str) -> Option<u32> {
        self.downscale.get(field).copied()
    }

    pub fn pending_writes(&self) -> impl Iterator<Item = &PendingWrite> {
        self.writes.values()
    }

    pub fn pending_deletes(&self) -> impl Iterator<Item = &PendingDelete> {
        self.deletes.values()
    }

    pub fn pending_write(&self, field: &str) -> Option<&PendingWrite> {
        self.writes.get(field)
    }

    pub fn pending_delete(&self, field: &str) -> Option<&PendingDelete> {
        self.deletes.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.deletes.is_empty()
    }

    pub(crate) fn mark_staged(&mut self) {
        self.state = TransactionState::Staged;
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
    }

    pub(crate) fn mark_failed(&mut self) {
        self.state = TransactionState::Failed;
    }
}

/// Make a client file name safe for paths and URLs.
///
/// Directory parts are dropped, the stem is slugged (falling back to `file`)
/// and the extension kept when it survives slugging.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let path = Path::new(base);

    let stem = path
        .file_stem()
        .map(|s| slug(&s.to_string_lossy()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "file".to_string());
    let extension = path
        .extension()
        .map(|e| slug(&e.to_string_lossy()))
        .unwrap_or_default();

    if extension.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        let cases = [
            ("My Holiday Photo.JPG", "My_Holiday_Photo.JPG"),
            ("résumé (v2).pdf", "resume_v2.pdf"),
            ("C:\\fakepath\\scan 01.png", "scan_01.png"),
            ("../../etc/passwd", "passwd"),
            ("archive.tar.gz", "archive_tar.gz"),
            ("README", "README"),
            ("日本.png", "file.png"),
            (".hidden", "hidden"),
        ];

        for (input, expected) in cases {
            assert_eq!(sanitize_filename(input), expected, "Input: {}", input);
        }
    }

    #[test]
    fn test_pending_write_from_upload() {
        let upload = UploadedFile::new("Cat Pic.png", "/tmp/php9x", 2048, "image/png").remote();
        let write = PendingWrite::from_upload("file", &upload);

        assert_eq!(write.field, "file");
        assert_eq!(write.filename, "Cat_Pic.png");
        assert_eq!(write.size, 2048);
        assert!(write.remote);
    }

    #[test]
    fn test_transaction_lifecycle() {
        let mut tx = UploadTransaction::new();
        assert_eq!(tx.state(), TransactionState::Idle);
        assert!(tx.is_empty());

        tx.stage_delete(PendingDelete {
            field: "file".to_string(),
            filename: "old.jpg".to_string(),
            id: 3,
        });
        tx.request_downscale("file", 800);
        assert_eq!(tx.state(), TransactionState::Staged);
        assert_eq!(tx.downscale_for("file"), Some(800));
        assert_eq!(tx.pending_deletes().count(), 1);

        tx.mark_committed();
        assert_eq!(tx.state(), TransactionState::Committed);

        tx.reset();
        assert_eq!(tx.state(), TransactionState::Idle);
        assert!(tx.is_empty());
        assert_eq!(tx.downscale_for("file"), None);
    }

    #[test]
    fn test_restaging_a_field_replaces_it() {
        let mut tx = UploadTransaction::new();
        let first = UploadedFile::new("a.png", "/tmp/a", 1, "image/png");
        let second = UploadedFile::new("b.png", "/tmp/b", 2, "image/png");
        tx.stage_write(PendingWrite::from_upload("file", &first));
        tx.stage_write(PendingWrite::from_upload("file", &second));

        assert_eq!(tx.pending_writes().count(), 1);
        assert_eq!(tx.pending_write("file").map(|w| w.filename.as_str()), Some("b.png"));
    }
}

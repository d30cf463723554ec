//! # uploader-attachments
//!
//! Attachment lifecycle handling for Uploader RS.
//!
//! ## Features
//!
//! - Per-transaction staging of uploads and deletions
//! - Lifecycle coordinator driving moves, deletes and style derivatives
//! - Local filesystem storage
//! - Upload validators (size, content type, presence, dimensions)
//! - Remote fetching of URL-valued fields
//! - Public URL resolution for stored files
//!
//! ## Example
//!
//! ```rust,ignore
//! use uploader_attachments::{AttachmentCoordinator, LocalStorage, UploadTransaction};
//!
//! let coordinator = AttachmentCoordinator::new(resolver, DerivativeGenerator::new(), Arc::new(LocalStorage::new()));
//! let mut tx = UploadTransaction::new();
//!
//! coordinator.reset(&mut tx);
//! validator.validate(&record, &mut tx, &store)?;
//! coordinator.stage_for_save(&mut tx, &mut record, &store)?;
//! // ... host persists the record and assigns its id ...
//! coordinator.commit_for_save(&mut tx, &record, true)?;
//! ```

pub mod coordinator;
pub mod fetch;
pub mod helper;
pub mod reader;
pub mod staging;
pub mod storage;
pub mod validators;

pub use coordinator::{AttachmentCoordinator, CommitReport};
pub use fetch::{is_remote_url, HttpFetcher, RemoteFetcher};
pub use helper::UrlHelper;
pub use reader::{MemoryRecordStore, RecordReader};
pub use staging::{
    sanitize_filename, PendingDelete, PendingWrite, TransactionState, UploadTransaction,
};
pub use storage::{LocalStorage, Storage, StorageError, StorageResult};
pub use validators::{
    attachment_present, parse_byte_size, AttachmentValidator, ContentTypeRule, DimensionRule,
    FieldRules, FileSizeLimit,
};

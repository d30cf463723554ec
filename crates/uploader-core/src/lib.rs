//! # uploader-core
//!
//! Core types, settings, and errors for Uploader RS.
//!
//! This crate provides the building blocks shared by the other crates:
//! - The error taxonomy (`UploadError`) and validation errors
//! - Attachment settings and configuration loading
//! - The attachment settings registry
//! - Record and upload types handed over by the host
//! - Inflection helpers for table names and file-name slugs

pub mod config;
pub mod error;
pub mod inflector;
pub mod registry;
pub mod types;

pub use config::{
    AttachmentEntry, AttachmentSettings, ConfigError, ImageEngine, MetaFields, UploaderConfig,
    DEFAULT_PATH, ORIGINAL_STYLE,
};
pub use error::*;
pub use registry::{AttachmentRegistry, AttachmentRegistryBuilder};
pub use types::*;

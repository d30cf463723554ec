//! Core error types for Uploader RS
//!
//! One enum covers every failure the attachment lifecycle can raise; validator
//! outcomes are collected separately in [`ValidationErrors`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

/// Core error type for all attachment operations
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No attachment configured for {model}.{field}")]
    Configuration { model: String, field: String },

    #[error("Invalid attachment settings for {model}.{field}: {message}")]
    InvalidSettings {
        model: String,
        field: String,
        message: String,
    },

    #[error("Directory is not writable: {}", path.display())]
    DirectoryUnwritable { path: PathBuf },

    #[error("Unsupported geometry: {0:?}")]
    UnsupportedGeometry(String),

    #[error("Source file missing: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Failed to fetch {url}: {message}")]
    RemoteFetch { url: String, message: String },

    #[error("Image backend error: {0}")]
    Image(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    pub fn configuration(model: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Configuration {
            model: model.into(),
            field: field.into(),
        }
    }

    pub fn invalid_settings(
        model: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidSettings {
            model: model.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the error aborts the rest of the current transaction.
    ///
    /// Unsupported geometries only skip one derivative; a missing source is
    /// fatal here because the delete path never surfaces it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, UploadError::UnsupportedGeometry(_))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            UploadError::Configuration { .. } => "configuration_error",
            UploadError::InvalidSettings { .. } => "invalid_settings",
            UploadError::DirectoryUnwritable { .. } => "directory_unwritable",
            UploadError::UnsupportedGeometry(_) => "unsupported_geometry",
            UploadError::SourceMissing(_) => "source_missing",
            UploadError::RemoteFetch { .. } => "remote_fetch_failed",
            UploadError::Image(_) => "image_error",
            UploadError::Io(_) => "io_error",
        }
    }
}

/// Standard Result type for attachment operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Validation errors collection, keyed by record field
#[derive(Error, Debug, Default, Clone, PartialEq)]
#[error("Validation errors: {errors:?}")]
pub struct ValidationErrors {
    /// Field-specific errors: field_name -> Vec<error_messages>
    pub errors: BTreeMap<String, Vec<String>>,
    /// Base errors not tied to a specific field
    pub base_errors: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn add_base(&mut self, message: impl Into<String>) {
        self.base_errors.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.base_errors.is_empty()
    }

    /// Check if there are errors for a specific field
    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    /// Get errors for a specific field
    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.errors.get(field)
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
        self.base_errors.extend(other.base_errors);
    }

    pub fn full_messages(&self) -> Vec<String> {
        let mut messages = self.base_errors.clone();
        for (field, field_messages) in &self.errors {
            for msg in field_messages {
                messages.push(format!("{} {}", field, msg));
            }
        }
        messages
    }

    /// `Ok(())` when empty, otherwise the collected errors
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

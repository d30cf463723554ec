//! Upload validators
//!
//! Rules run per attachment field before staging. Size, content-type and
//! dimension rules only look at a new upload and pass when there is none;
//! presence is the rule that requires one.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use uploader_core::{
    AttachmentRegistry, FieldValue, Record, UploadResult, UploadedFile, ValidationErrors,
};
use uploader_imaging::{probe_dimensions, Dimensions};

use crate::reader::RecordReader;
use crate::staging::UploadTransaction;

static BYTE_SIZE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([0-9]+(?:\.[0-9]+)?) ?([A-Za-z]*)\s*$").expect("valid regex")
});

/// Parse sizes such as `100KB` or `1.5 MB` into bytes (1024-based)
pub fn parse_byte_size(text: &str) -> Option<u64> {
    let captures = BYTE_SIZE.captures(text)?;
    let number: f64 = captures[1].parse().ok()?;
    let exponent = match captures[2].to_ascii_uppercase().as_str() {
        "" | "B" | "BYTES" => 0,
        "KB" => 1,
        "MB" => 2,
        "GB" => 3,
        "TB" => 4,
        "PB" => 5,
        _ => return None,
    };
    Some((number * 1024f64.powi(exponent)).round() as u64)
}

/// Allowed upload size range in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSizeLimit {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl FileSizeLimit {
    pub fn max(max: u64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn between(min: u64, max: u64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Limits written as byte-size strings, e.g. `("1KB", "2MB")`
    pub fn parse(min: Option<&str>, max: Option<&str>) -> Option<Self> {
        let min = match min {
            Some(text) => Some(parse_byte_size(text)?),
            None => None,
        };
        let max = match max {
            Some(text) => Some(parse_byte_size(text)?),
            None => None,
        };
        Some(Self { min, max })
    }

    pub fn check(&self, file: &UploadedFile) -> bool {
        self.min.map_or(true, |min| file.size >= min) && self.max.map_or(true, |max| file.size <= max)
    }
}

#[derive(Debug, Clone)]
enum ContentTypePattern {
    Exact(String),
    Pattern(Regex),
}

/// Allowed MIME types: exact names or `/regex/` patterns
#[derive(Debug, Clone)]
pub struct ContentTypeRule {
    patterns: Vec<ContentTypePattern>,
}

impl ContentTypeRule {
    /// Build from entries like `image/png` or `/^video\/.+/`
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Result<Self, regex::Error> {
        let patterns = entries
            .iter()
            .map(|entry| parse_content_type(entry.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Whether a MIME type is allowed
    pub fn allows(&self, mime: &str) -> bool {
        self.patterns.iter().any(|pattern| match pattern {
            ContentTypePattern::Exact(expected) => expected == mime,
            ContentTypePattern::Pattern(regex) => regex.is_match(mime),
        })
    }

    /// Check an upload, sniffing its type from the file contents
    pub fn check(&self, file: &UploadedFile) -> bool {
        self.allows(&detect_content_type(file))
    }
}

fn parse_content_type(entry: &str) -> Result<ContentTypePattern, regex::Error> {
    let Some(body) = entry.strip_prefix('/') else {
        return Ok(ContentTypePattern::Exact(entry.to_string()));
    };

    let (pattern, flags) = match body.rfind('/') {
        Some(end) => (&body[..end], &body[end + 1..]),
        None => (body, ""),
    };
    let pattern = pattern.replace("\\/", "/");
    let source = if flags.contains('i') {
        format!("(?i){}", pattern)
    } else {
        pattern
    };
    Ok(ContentTypePattern::Pattern(Regex::new(&source)?))
}

/// MIME type from the file's magic bytes, else the declared one
pub fn detect_content_type(file: &UploadedFile) -> String {
    match infer::get_from_path(&file.tmp_path) {
        Ok(Some(kind)) => kind.mime_type().to_string(),
        _ => file.content_type.clone(),
    }
}

/// Image dimension constraint in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionRule {
    ExactWidth(u32),
    ExactHeight(u32),
    MinWidth(u32),
    MinHeight(u32),
    MaxWidth(u32),
    MaxHeight(u32),
}

impl DimensionRule {
    pub fn check(&self, dimensions: Dimensions) -> bool {
        let Dimensions { width, height } = dimensions;
        match *self {
            DimensionRule::ExactWidth(n) => width == n,
            DimensionRule::ExactHeight(n) => height == n,
            DimensionRule::MinWidth(n) => width >= n,
            DimensionRule::MinHeight(n) => height >= n,
            DimensionRule::MaxWidth(n) => width <= n,
            DimensionRule::MaxHeight(n) => height <= n,
        }
    }
}

impl fmt::Display for DimensionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionRule::ExactWidth(n) => write!(f, "must be exactly {} pixels wide", n),
            DimensionRule::ExactHeight(n) => write!(f, "must be exactly {} pixels high", n),
            DimensionRule::MinWidth(n) => write!(f, "must be at least {} pixels wide", n),
            DimensionRule::MinHeight(n) => write!(f, "must be at least {} pixels high", n),
            DimensionRule::MaxWidth(n) => write!(f, "must be at most {} pixels wide", n),
            DimensionRule::MaxHeight(n) => write!(f, "must be at most {} pixels high", n),
        }
    }
}

/// The non-empty upload held by `field`, if any
fn new_upload<'a>(record: &'a Record, field: &str) -> Option<&'a UploadedFile> {
    record
        .data
        .get(field)
        .and_then(FieldValue::as_upload)
        .filter(|file| !file.is_empty())
}

/// Whether the record has a file for `field`: a new upload, or a value
/// already stored on an existing record
pub fn attachment_present(record: &Record, field: &str, reader: &dyn RecordReader) -> UploadResult<bool> {
    if new_upload(record, field).is_some() {
        return Ok(true);
    }
    let Some(id) = record.id else {
        return Ok(false);
    };

    match record.data.get(field) {
        Some(value) => Ok(!value.is_blank()),
        None => {
            let stored = reader.read_fields(&record.model, id, &[field.to_string()])?;
            Ok(stored.get(field).is_some_and(|value| !value.is_blank()))
        }
    }
}

/// Rules for one attachment field
#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    pub required: bool,
    pub size: Option<FileSizeLimit>,
    pub content_type: Option<ContentTypeRule>,
    pub dimensions: Vec<DimensionRule>,
}

impl FieldRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn size(mut self, limit: FileSizeLimit) -> Self {
        self.size = Some(limit);
        self
    }

    pub fn content_type(mut self, rule: ContentTypeRule) -> Self {
        self.content_type = Some(rule);
        self
    }

    pub fn dimension(mut self, rule: DimensionRule) -> Self {
        self.dimensions.push(rule);
        self
    }
}

/// Runs [`FieldRules`] against records
#[derive(Debug, Clone)]
pub struct AttachmentValidator {
    registry: Arc<AttachmentRegistry>,
    rules: BTreeMap<(String, String), FieldRules>,
}

impl AttachmentValidator {
    pub fn new(registry: Arc<AttachmentRegistry>) -> Self {
        Self {
            registry,
            rules: BTreeMap::new(),
        }
    }

    pub fn rules(mut self, model: impl Into<String>, field: impl Into<String>, rules: FieldRules) -> Self {
        self.rules.insert((model.into(), field.into()), rules);
        self
    }

    /// Validate every field with rules on the record's model.
    ///
    /// A too-wide image on a field with `resize_to_max_width` passes and
    /// requests a downscale on `tx` instead.
    pub fn validate(
        &self,
        record: &Record,
        tx: &mut UploadTransaction,
        reader: &dyn RecordReader,
    ) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        for ((model, field), rules) in &self.rules {
            if *model != record.model {
                continue;
            }

            if rules.required {
                match attachment_present(record, field, reader) {
                    Ok(true) => {}
                    Ok(false) => errors.add(field.clone(), "is required"),
                    Err(err) => errors.add(field.clone(), format!("could not be checked: {}", err)),
                }
            }

            let Some(file) = new_upload(record, field) else {
                continue;
            };

            if rules.size.is_some_and(|limit| !limit.check(file)) {
                errors.add(field.clone(), "has an invalid file size");
            }
            if rules.content_type.as_ref().is_some_and(|rule| !rule.check(file)) {
                errors.add(field.clone(), "has an invalid content type");
            }
            if !rules.dimensions.is_empty() {
                self.check_dimensions(record, field, file, &rules.dimensions, tx, &mut errors);
            }
        }

        errors.into_result()
    }

    fn check_dimensions(
        &self,
        record: &Record,
        field: &str,
        file: &UploadedFile,
        rules: &[DimensionRule],
        tx: &mut UploadTransaction,
        errors: &mut ValidationErrors,
    ) {
        let Ok(dimensions) = probe_dimensions(&file.tmp_path) else {
            errors.add(field, "is not a readable image");
            return;
        };

        let downscale = self
            .registry
            .get(&record.model, field)
            .map(|settings| settings.resize_to_max_width)
            .unwrap_or(false);

        for rule in rules {
            if rule.check(dimensions) {
                continue;
            }
            match rule {
                DimensionRule::MaxWidth(max) if downscale => {
                    debug!(field = field, width = dimensions.width, max = max, "Requesting downscale");
                    tx.request_downscale(field, *max);
                }
                _ => errors.add(field, rule.to_string()),
            }
        }
    }
}

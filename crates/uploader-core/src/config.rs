//! Attachment settings and configuration loading

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{UploadError, UploadResult};
use crate::registry::AttachmentRegistry;

/// Default path template for stored files
pub const DEFAULT_PATH: &str = ":webroot/uploads/:model/:id/:style-:filename:extension";

/// Style name of the primary stored file
pub const ORIGINAL_STYLE: &str = "original";

/// Image backend used to produce derivatives
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ImageEngine {
    /// Filtered (Lanczos3) resampling
    #[default]
    Standard,
    /// Integer-sampled thumbnailing, faster and rougher
    Fast,
}

impl ImageEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Fast => "fast",
        }
    }
}

impl fmt::Display for ImageEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImageEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "fast" => Ok(Self::Fast),
            other => Err(format!("unknown image engine: {}", other)),
        }
    }
}

/// Record fields that receive upload metadata
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct MetaFields {
    pub filesize: String,
    pub content_type: String,
}

impl Default for MetaFields {
    fn default() -> Self {
        Self {
            filesize: "filesize".to_string(),
            content_type: "content_type".to_string(),
        }
    }
}

/// Configuration of one attachment field, fixed once registered
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct AttachmentSettings {
    /// Filesystem path template
    pub path: String,
    /// Public URL template; callers fall back to `path` when absent
    pub url: Option<String>,
    /// Template used when a record has no stored file
    pub default_url: Option<String>,
    /// Style name -> geometry specifier
    pub styles: BTreeMap<String, String>,
    /// Downscale the primary file when a max-width validator trips
    pub resize_to_max_width: bool,
    /// Output quality, 1-100
    pub quality: u8,
    /// Sibling field holding a remote URL to fetch when nothing was uploaded
    pub url_field: Option<String>,
    pub engine: ImageEngine,
    pub meta: MetaFields,
}

impl Default for AttachmentSettings {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            url: None,
            default_url: None,
            styles: BTreeMap::new(),
            resize_to_max_width: false,
            quality: 90,
            url_field: None,
            engine: ImageEngine::default(),
            meta: MetaFields::default(),
        }
    }
}

impl AttachmentSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, template: impl Into<String>) -> Self {
        self.path = template.into();
        self
    }

    pub fn url(mut self, template: impl Into<String>) -> Self {
        self.url = Some(template.into());
        self
    }

    pub fn default_url(mut self, template: impl Into<String>) -> Self {
        self.default_url = Some(template.into());
        self
    }

    pub fn style(mut self, name: impl Into<String>, geometry: impl Into<String>) -> Self {
        self.styles.insert(name.into(), geometry.into());
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn engine(mut self, engine: ImageEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn resize_to_max_width(mut self, enabled: bool) -> Self {
        self.resize_to_max_width = enabled;
        self
    }

    pub fn url_field(mut self, field: impl Into<String>) -> Self {
        self.url_field = Some(field.into());
        self
    }

    pub fn meta(mut self, filesize: impl Into<String>, content_type: impl Into<String>) -> Self {
        self.meta = MetaFields {
            filesize: filesize.into(),
            content_type: content_type.into(),
        };
        self
    }

    /// Style names in processing order, `original` first
    pub fn style_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(ORIGINAL_STYLE).chain(self.styles.keys().map(String::as_str))
    }

    /// Setup-time checks; registration fails on the first problem
    pub fn validate(&self, model: &str, field: &str) -> UploadResult<()> {
        if self.path.trim().is_empty() {
            return Err(UploadError::invalid_settings(model, field, "path template is empty"));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(UploadError::invalid_settings(
                model,
                field,
                format!("quality {} is outside 1-100", self.quality),
            ));
        }
        if self.styles.contains_key(ORIGINAL_STYLE) {
            return Err(UploadError::invalid_settings(
                model,
                field,
                "style name \"original\" is reserved for the primary file",
            ));
        }
        if self.styles.keys().any(|name| name.trim().is_empty()) {
            return Err(UploadError::invalid_settings(model, field, "style name is empty"));
        }
        if self.meta.filesize == field || self.meta.content_type == field {
            return Err(UploadError::invalid_settings(
                model,
                field,
                "metadata fields must differ from the attachment field",
            ));
        }
        Ok(())
    }
}

/// One registered attachment in a configuration file
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AttachmentEntry {
    pub model: String,
    pub field: String,
    #[serde(flatten)]
    pub settings: AttachmentSettings,
}

/// Process-level uploader configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct UploaderConfig {
    /// Filesystem root substituted for `:webroot`
    pub webroot: String,
    /// Salt mixed into the `:hash` token
    pub security_salt: String,
    pub attachments: Vec<AttachmentEntry>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            webroot: "public".to_string(),
            security_salt: "change-me-in-production".to_string(),
            attachments: Vec::new(),
        }
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable not set: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("Config file error: {0}")]
    FileError(String),
}

impl UploaderConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(webroot) = std::env::var("UPLOADER_WEBROOT") {
            config.webroot = webroot;
        }
        if let Ok(salt) = std::env::var("UPLOADER_SECURITY_SALT") {
            if salt.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "UPLOADER_SECURITY_SALT".to_string(),
                    message: "must not be empty".to_string(),
                });
            }
            config.security_salt = salt;
        }

        Ok(config)
    }

    /// Load a config file (TOML, YAML or JSON by extension), with
    /// `UPLOADER_*` environment variables taking precedence
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileError(format!(
                "{} does not exist",
                path.display()
            )));
        }

        config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("UPLOADER"))
            .build()
            .and_then(|settings| settings.try_deserialize::<UploaderConfig>())
            .map_err(|e| ConfigError::FileError(e.to_string()))
    }

    /// Webroot without a trailing slash
    pub fn webroot(&self) -> &str {
        let trimmed = self.webroot.trim_end_matches('/');
        if trimmed.is_empty() && self.webroot.starts_with('/') {
            "/"
        } else {
            trimmed
        }
    }

    /// Validate every attachment entry and build the registry
    pub fn build_registry(&self) -> UploadResult<AttachmentRegistry> {
        self.attachments
            .iter()
            .fold(AttachmentRegistry::builder(), |builder, entry| {
                builder.register(&entry.model, &entry.field, entry.settings.clone())
            })
            .build()
    }
}

//! Path resolution for attachment fields
//!
//! Builds the default token set for a (model, id, field, filename, style)
//! tuple and interpolates the `path`, `url` and `default_url` templates of the
//! field's settings. Resolution is pure: no filesystem access.

use std::path::Path;
use std::sync::Arc;

use uploader_core::inflector::tableize;
use uploader_core::{AttachmentRegistry, AttachmentSettings, Id, UploadResult, UploaderConfig};

use crate::interpolator::{FileContext, InterpolationContext, Interpolator};

/// Interpolated templates of one attachment field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub path: Option<String>,
    pub url: Option<String>,
    pub default_url: Option<String>,
}

impl ResolvedPaths {
    /// `url` if configured, otherwise `path`
    pub fn public_url(&self) -> Option<&str> {
        self.url.as_deref().or(self.path.as_deref())
    }
}

/// Resolves attachment templates against record context
#[derive(Debug, Clone)]
pub struct PathResolver {
    registry: Arc<AttachmentRegistry>,
    interpolator: Arc<Interpolator>,
    webroot: String,
    salt: String,
}

impl PathResolver {
    pub fn new(
        registry: Arc<AttachmentRegistry>,
        interpolator: Arc<Interpolator>,
        webroot: impl Into<String>,
        salt: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            interpolator,
            webroot: webroot.into(),
            salt: salt.into(),
        }
    }

    /// Resolver using the webroot and salt of a loaded configuration
    pub fn from_config(
        config: &UploaderConfig,
        registry: Arc<AttachmentRegistry>,
        interpolator: Arc<Interpolator>,
    ) -> Self {
        Self::new(registry, interpolator, config.webroot(), config.security_salt.clone())
    }

    pub fn registry(&self) -> &AttachmentRegistry {
        &self.registry
    }

    /// Interpolate every template present in the field's settings
    pub fn get_paths(
        &self,
        model: &str,
        id: Option<Id>,
        field: &str,
        filename: &str,
        style: &str,
        overrides: &InterpolationContext,
    ) -> UploadResult<ResolvedPaths> {
        let settings = self.registry.get(model, field)?;
        Ok(self.resolve_settings(settings, model, id, field, filename, style, overrides))
    }

    /// Like [`get_paths`](Self::get_paths) for settings already looked up
    #[allow(clippy::too_many_arguments)]
    pub fn resolve_settings(
        &self,
        settings: &AttachmentSettings,
        model: &str,
        id: Option<Id>,
        field: &str,
        filename: &str,
        style: &str,
        overrides: &InterpolationContext,
    ) -> ResolvedPaths {
        let file = file_context(model, id, field, filename, style);
        let context = self.context(&file, overrides);
        let render = |template: &String| self.interpolator.run(template, &file, context.clone());

        ResolvedPaths {
            path: Some(render(&settings.path)),
            url: settings.url.as_ref().map(render),
            default_url: settings.default_url.as_ref().map(render),
        }
    }

    /// Overrides first, then the default tokens for anything not overridden
    fn context(&self, file: &FileContext, overrides: &InterpolationContext) -> InterpolationContext {
        let extension = if file.extension.is_empty() {
            String::new()
        } else {
            format!(".{}", file.extension)
        };

        let mut context = overrides.clone();
        context.fill_missing([
            ("webroot".to_string(), self.webroot.clone()),
            ("model".to_string(), tableize(&file.model)),
            ("field".to_string(), file.field.to_lowercase()),
            ("filename".to_string(), file.stem.clone()),
            ("extension".to_string(), extension),
            (
                "id".to_string(),
                file.id.map(|id| id.to_string()).unwrap_or_default(),
            ),
            ("style".to_string(), file.style.clone()),
            ("hash".to_string(), filename_hash(&file.filename, &self.salt)),
        ]);
        context
    }
}

/// MD5 hex digest of a file name plus salt
pub fn filename_hash(filename: &str, salt: &str) -> String {
    format!("{:x}", md5::compute(format!("{}{}", filename, salt)))
}

fn file_context(model: &str, id: Option<Id>, field: &str, filename: &str, style: &str) -> FileContext {
    let path = Path::new(filename);
    let os_str = |s: Option<&std::ffi::OsStr>| {
        s.map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
    };

    FileContext {
        filename: os_str(path.file_name()),
        stem: os_str(path.file_stem()),
        extension: os_str(path.extension()),
        model: model.to_string(),
        field: field.to_string(),
        id,
        style: style.to_string(),
    }
}

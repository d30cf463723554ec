//! Public URLs for stored attachments

use uploader_core::{FieldValue, Id, Record, UploadResult};
use uploader_interpolation::{InterpolationContext, PathResolver};

/// Resolves the public URL of a stored file, or the field's default URL
#[derive(Debug, Clone)]
pub struct UrlHelper {
    resolver: PathResolver,
}

impl UrlHelper {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// URL of `style` for a stored `(id, filename)`, resolved with an empty
    /// webroot. Falls back to `path` when no `url` template is configured,
    /// and to `default_url` when nothing is stored.
    pub fn url(
        &self,
        model: &str,
        field: &str,
        stored: Option<(Id, &str)>,
        style: &str,
    ) -> UploadResult<Option<String>> {
        let overrides = InterpolationContext::new().with("webroot", "");

        let paths = match stored {
            Some((id, filename)) if !filename.is_empty() => {
                let paths = self
                    .resolver
                    .get_paths(model, Some(id), field, filename, style, &overrides)?;
                return Ok(paths.public_url().map(str::to_string));
            }
            _ => self.resolver.get_paths(model, None, field, "", style, &overrides)?,
        };
        Ok(paths.default_url)
    }

    /// [`url`](Self::url) for the stored value of a record's field
    pub fn url_for(&self, record: &Record, field: &str, style: &str) -> UploadResult<Option<String>> {
        let filename = record.data.get(field).and_then(FieldValue::stored_filename);
        let stored = record.id.zip(filename);
        self.url(&record.model, field, stored, style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uploader_core::{AttachmentRegistry, AttachmentSettings};
    use uploader_interpolation::Interpolator;

    fn helper() -> UrlHelper {
        let registry = AttachmentRegistry::builder()
            .register(
                "Image",
                "file",
                AttachmentSettings::new()
                    .style("thumb", "[100x100]")
                    .default_url("/img/missing-:style.png"),
            )
            .register(
                "Document",
                "file",
                AttachmentSettings::new()
                    .path(":webroot/files/:id/:filename:extension")
                    .url("https://cdn.example.com/:model/:id/:filename:extension"),
            )
            .build()
            .unwrap();
        UrlHelper::new(PathResolver::new(
            Arc::new(registry),
            Arc::new(Interpolator::new()),
            "/var/www/public",
            "salt",
        ))
    }

    #[test]
    fn test_url_uses_path_without_webroot() {
        let url = helper().url("Image", "file", Some((3, "cat.png")), "thumb").unwrap();
        assert_eq!(url.as_deref(), Some("/uploads/images/3/thumb-cat.png"));
    }

    #[test]
    fn test_url_template_wins_over_path() {
        let url = helper().url("Document", "file", Some((8, "spec.pdf")), "original").unwrap();
        assert_eq!(url.as_deref(), Some("https://cdn.example.com/documents/8/spec.pdf"));
    }

    #[test]
    fn test_default_url_when_nothing_stored() {
        let helper = helper();
        let url = helper.url("Image", "file", None, "thumb").unwrap();
        assert_eq!(url.as_deref(), Some("/img/missing-thumb.png"));

        let record = Record::new("Image").with_id(3).with_field("file", "");
        let url = helper.url_for(&record, "file", "original").unwrap();
        assert_eq!(url.as_deref(), Some("/img/missing-original.png"));

        assert_eq!(helper.url("Document", "file", None, "original").unwrap(), None);
    }

    #[test]
    fn test_url_for_record() {
        let record = Record::new("Image").with_id(9).with_field("file", "dog.jpg");
        let url = helper().url_for(&record, "file", "original").unwrap();
        assert_eq!(url.as_deref(), Some("/uploads/images/9/original-dog.jpg"));
    }

    #[test]
    fn test_unregistered_field() {
        assert!(helper().url("Image", "avatar", None, "original").is_err());
    }
}

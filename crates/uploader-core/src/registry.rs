//! Registry of attachment settings keyed by (model, field)
//!
//! Built once during setup through [`AttachmentRegistryBuilder`]; the built
//! registry has no mutating methods and is shared behind an `Arc`.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::AttachmentSettings;
use crate::error::{UploadError, UploadResult};

/// Immutable attachment settings lookup
#[derive(Debug, Clone, Default)]
pub struct AttachmentRegistry {
    models: BTreeMap<String, BTreeMap<String, AttachmentSettings>>,
}

impl AttachmentRegistry {
    pub fn builder() -> AttachmentRegistryBuilder {
        AttachmentRegistryBuilder::default()
    }

    /// Settings for one attachment field
    pub fn get(&self, model: &str, field: &str) -> UploadResult<&AttachmentSettings> {
        self.models
            .get(model)
            .and_then(|fields| fields.get(field))
            .ok_or_else(|| UploadError::configuration(model, field))
    }

    pub fn contains(&self, model: &str, field: &str) -> bool {
        self.get(model, field).is_ok()
    }

    /// Every attachment field configured for a model, in field-name order
    pub fn fields<'a>(
        &'a self,
        model: &str,
    ) -> impl Iterator<Item = (&'a str, &'a AttachmentSettings)> + 'a {
        self.models
            .get(model)
            .into_iter()
            .flat_map(|fields| fields.iter().map(|(name, settings)| (name.as_str(), settings)))
    }

    /// Attachment field names of a model
    pub fn field_names(&self, model: &str) -> Vec<String> {
        self.fields(model).map(|(name, _)| name.to_string()).collect()
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Setup-phase builder for [`AttachmentRegistry`]
#[derive(Debug, Default)]
pub struct AttachmentRegistryBuilder {
    models: BTreeMap<String, BTreeMap<String, AttachmentSettings>>,
}

impl AttachmentRegistryBuilder {
    /// Register settings for a field; a later registration replaces an earlier one
    pub fn register(
        mut self,
        model: impl Into<String>,
        field: impl Into<String>,
        settings: AttachmentSettings,
    ) -> Self {
        let model = model.into();
        let field = field.into();
        let replaced = self
            .models
            .entry(model.clone())
            .or_default()
            .insert(field.clone(), settings)
            .is_some();
        if replaced {
            debug!(model = %model, field = %field, "Attachment settings replaced");
        }
        self
    }

    /// Validate every registration and freeze the registry
    pub fn build(self) -> UploadResult<AttachmentRegistry> {
        for (model, fields) in &self.models {
            for (field, settings) in fields {
                settings.validate(model, field)?;
            }
        }
        Ok(AttachmentRegistry { models: self.models })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let registry = AttachmentRegistry::builder()
            .register("Image", "file", AttachmentSettings::new().style("thumb", "[50x50]"))
            .register("Image", "preview", AttachmentSettings::new())
            .register("User", "avatar", AttachmentSettings::new())
            .build()
            .unwrap();

        assert!(registry.contains("Image", "file"));
        assert_eq!(registry.field_names("Image"), vec!["file", "preview"]);
        assert_eq!(registry.models().collect::<Vec<_>>(), vec!["Image", "User"]);
        assert_eq!(registry.fields("Post").count(), 0);
    }

    #[test]
    fn test_unknown_field_is_configuration_error() {
        let registry = AttachmentRegistry::builder().build().unwrap();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.get("Image", "file"),
            Err(UploadError::Configuration { .. })
        ));
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = AttachmentRegistry::builder()
            .register("Image", "file", AttachmentSettings::new().quality(50))
            .register("Image", "file", AttachmentSettings::new().quality(70))
            .build()
            .unwrap();
        assert_eq!(registry.get("Image", "file").unwrap().quality, 70);
    }

    #[test]
    fn test_build_validates() {
        let result = AttachmentRegistry::builder()
            .register("Image", "file", AttachmentSettings::new().quality(101))
            .build();
        assert!(matches!(result, Err(UploadError::InvalidSettings { .. })));
    }
}

//! Token interpolation
//!
//! Replaces `:name` tokens in a template with values from an
//! [`InterpolationContext`]. Custom resolvers registered on an
//! [`Interpolator`] compute extra (or replacement) values from the file being
//! processed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;
use uploader_core::Id;

/// What a custom resolver gets to look at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContext {
    /// Full file name, e.g. `photo.jpg`
    pub filename: String,
    /// File name without extension, e.g. `photo`
    pub stem: String,
    /// Extension without the dot, e.g. `jpg`
    pub extension: String,
    pub model: String,
    pub field: String,
    pub id: Option<Id>,
    pub style: String,
}

/// A named resolver computing one token value
pub type Resolver = Arc<dyn Fn(&FileContext) -> String + Send + Sync>;

/// Key/value data for one template resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterpolationContext {
    values: BTreeMap<String, String>,
}

impl InterpolationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Fill in keys that are not already present
    pub fn fill_missing(&mut self, defaults: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in defaults {
            self.values.entry(key).or_insert(value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The longest key that is a prefix of `ident`
    fn longest_prefix(&self, ident: &str) -> Option<(&str, &str)> {
        self.values
            .iter()
            .filter(|(key, _)| !key.is_empty() && ident.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for InterpolationContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Resolver registry plus the substitution routine
#[derive(Clone, Default)]
pub struct Interpolator {
    resolvers: BTreeMap<String, Resolver>,
}

impl fmt::Debug for Interpolator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpolator")
            .field("resolvers", &self.resolvers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Interpolator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named resolver; a later registration under the same name wins
    pub fn register<F>(&mut self, name: impl Into<String>, resolver: F) -> &mut Self
    where
        F: Fn(&FileContext) -> String + Send + Sync + 'static,
    {
        let name = name.into();
        if self.resolvers.insert(name.clone(), Arc::new(resolver)).is_some() {
            debug!(name = %name, "Resolver replaced");
        } else {
            debug!(name = %name, "Resolver registered");
        }
        self
    }

    /// Drop every custom resolver
    pub fn clear(&mut self) {
        debug!(count = self.resolvers.len(), "Resolvers cleared");
        self.resolvers.clear();
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.resolvers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resolvers.keys().map(String::as_str)
    }

    /// Run every resolver against `file`, overwriting context values, then
    /// substitute the template
    pub fn run(&self, template: &str, file: &FileContext, mut context: InterpolationContext) -> String {
        for (name, resolver) in &self.resolvers {
            context.insert(name.clone(), resolver(file));
        }
        substitute(template, &context)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Replace `:token` occurrences with context values.
///
/// A token is `:` followed by an identifier. The longest context key that
/// prefixes the identifier is substituted and scanning resumes right after
/// that key; an identifier with no matching key renders as nothing. A `:`
/// that does not start an identifier is copied through.
pub fn substitute(template: &str, context: &InterpolationContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(':') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if !after.starts_with(is_ident_start) {
            out.push(':');
            rest = after;
            continue;
        }

        let ident_len = after
            .find(|c: char| !is_ident_char(c))
            .unwrap_or(after.len());
        let ident = &after[..ident_len];

        match context.longest_prefix(ident) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &after[key.len()..];
            }
            None => rest = &after[ident_len..],
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> FileContext {
        FileContext {
            filename: "photo.jpg".to_string(),
            stem: "photo".to_string(),
            extension: "jpg".to_string(),
            model: "Image".to_string(),
            field: "file".to_string(),
            id: Some(1),
            style: "thumb".to_string(),
        }
    }

    #[test]
    fn test_substitute_tokens() {
        let context = InterpolationContext::new()
            .with("id", "7")
            .with("style", "thumb")
            .with("filename", "photo")
            .with("extension", ".jpg");

        assert_eq!(
            substitute("/uploads/:id/:style-:filename:extension", &context),
            "/uploads/7/thumb-photo.jpg"
        );
    }

    #[test]
    fn test_missing_token_is_empty() {
        let context = InterpolationContext::new().with("id", "7");
        assert_eq!(substitute("/a/:unknown/:id", &context), "/a//7");
    }

    #[test]
    fn test_longest_key_wins() {
        let context = InterpolationContext::new()
            .with("file", "F")
            .with("filename", "photo")
            .with("id", "7");

        assert_eq!(substitute(":filename", &context), "photo");
        assert_eq!(substitute(":files", &context), "Fs");
        assert_eq!(substitute(":idx", &context), "7x");
    }

    #[test]
    fn test_colon_without_identifier_is_literal() {
        let context = InterpolationContext::new().with("host", "example.com");
        assert_eq!(
            substitute("http://:host:8080/", &context),
            "http://example.com:8080/"
        );
        assert_eq!(substitute("trailing:", &context), "trailing:");
    }

    #[test]
    fn test_resolvers_override_context() {
        let mut interpolator = Interpolator::new();
        interpolator
            .register("style", |_| "custom".to_string())
            .register("upper", |f: &FileContext| f.stem.to_uppercase());

        let context = InterpolationContext::new().with("style", "thumb");
        assert_eq!(
            interpolator.run(":style/:upper", &file(), context),
            "custom/PHOTO"
        );
    }

    #[test]
    fn test_last_registration_wins() {
        let mut interpolator = Interpolator::new();
        interpolator.register("tag", |_| "first".to_string());
        interpolator.register("tag", |_| "second".to_string());

        assert_eq!(interpolator.names().collect::<Vec<_>>(), vec!["tag"]);
        assert_eq!(
            interpolator.run(":tag", &file(), InterpolationContext::new()),
            "second"
        );
    }

    #[test]
    fn test_clear_forgets_resolvers() {
        let mut interpolator = Interpolator::new();
        interpolator.register("old", |_| "gone".to_string());
        interpolator.clear();
        interpolator.register("new", |f: &FileContext| f.extension.clone());

        assert!(!interpolator.is_registered("old"));
        assert_eq!(
            interpolator.run("[:old][:new]", &file(), InterpolationContext::new()),
            "[][jpg]"
        );
    }
}

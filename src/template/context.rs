//! Render context: the flat substitution values for templated files.

use std::collections::BTreeMap;

use crate::request::GenerationRequest;

/// Key for the package name.
pub const PACKAGE_NAME: &str = "packageName";
/// Key for the package version.
pub const PACKAGE_VERSION: &str = "packageVersion";
/// Key for the project name.
pub const PROJECT_NAME: &str = "projectName";
/// Key for the companion theme package name.
pub const THEMES_NAME: &str = "themesName";
/// Key for the companion theme package version.
pub const THEMES_VERSION: &str = "themesVersion";
/// Key for the storage key the site is published under.
pub const REMOTE_KEY: &str = "remoteKey";
/// Key for the URL path the site is served under (`/docs/@acme/ui/`).
/// Set by the coordinator, which knows the storage target.
pub const BASE_PATH: &str = "basePath";

/// Flat, ordered key/value map applied to every templated file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    values: BTreeMap<String, String>,
}

impl RenderContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the context from a request. Same request, same context.
    pub fn from_request(request: &GenerationRequest) -> Self {
        Self::new()
            .with(PACKAGE_NAME, &request.package.name)
            .with(PACKAGE_VERSION, &request.package.version)
            .with(PROJECT_NAME, &request.project_name)
            .with(THEMES_NAME, &request.package.themes_name)
            .with(THEMES_VERSION, &request.package.themes_version)
            .with(REMOTE_KEY, request.remote_key())
    }

    /// Adds or replaces a value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Looks up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no values are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn to_tera(&self) -> tera::Context {
        let mut context = tera::Context::new();
        for (key, value) in &self.values {
            context.insert(key.as_str(), value);
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::PackageDescriptor;

    #[test]
    fn test_from_request() {
        let request = GenerationRequest::new(
            "req-1",
            PackageDescriptor::new("@acme/ui", "2.3.1", "@acme/themes", "1.0.0"),
            "Acme UI",
            ["Button"],
        );
        let context = RenderContext::from_request(&request);

        assert_eq!(context.get(PACKAGE_NAME), Some("@acme/ui"));
        assert_eq!(context.get(PACKAGE_VERSION), Some("2.3.1"));
        assert_eq!(context.get(PROJECT_NAME), Some("Acme UI"));
        assert_eq!(context.get(THEMES_NAME), Some("@acme/themes"));
        assert_eq!(context.get(THEMES_VERSION), Some("1.0.0"));
        assert_eq!(context.get(REMOTE_KEY), Some("@acme/ui"));
        assert_eq!(context.len(), 6);
        assert_eq!(context, RenderContext::from_request(&request));
    }

    #[test]
    fn test_iteration_is_sorted() {
        let context = RenderContext::new().with("b", "2").with("a", "1").with("c", "3");
        let keys: Vec<&str> = context.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }
}

//! Inbound request types.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::build::ExtraPackage;
use crate::error::RequestError;

/// Published coordinates of a design-system package and its companion theme
/// package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    /// npm package name, possibly scoped (`@acme/ui`).
    pub name: String,
    /// Exact published version.
    pub version: String,
    /// Companion theme package name.
    pub themes_name: String,
    /// Exact companion theme package version.
    pub themes_version: String,
}

impl PackageDescriptor {
    /// Creates a new descriptor.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        themes_name: impl Into<String>,
        themes_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            themes_name: themes_name.into(),
            themes_version: themes_version.into(),
        }
    }
}

/// One documentation generation request.
///
/// Built once from the caller's payload and never mutated afterwards; the
/// coordinator only ever borrows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Opaque request identifier.
    pub id: String,
    /// Package coordinates, sent as `npm` on the wire.
    #[serde(rename = "npm")]
    pub package: PackageDescriptor,
    /// Human-readable project name used in the rendered site.
    pub project_name: String,
    /// Components to document, in caller order, without duplicates.
    #[serde(deserialize_with = "deserialize_components")]
    pub components: Vec<String>,
}

impl GenerationRequest {
    /// Creates a request, dropping duplicate component names.
    pub fn new<I, S>(
        id: impl Into<String>,
        package: PackageDescriptor,
        project_name: impl Into<String>,
        components: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            package,
            project_name: project_name.into(),
            components: dedup_preserving_order(components.into_iter().map(Into::into)),
        }
    }

    /// Parses a request from its JSON wire shape.
    pub fn from_json(json: &str) -> Result<Self, RequestError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a request file.
    pub fn from_file(path: &Path) -> Result<Self, RequestError> {
        let content = std::fs::read_to_string(path).map_err(|e| RequestError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    /// Storage key for this package's published site.
    ///
    /// Scoped packages keep their scope as a path segment (`@acme/ui`), so
    /// distinct package names never share or nest inside each other's key.
    pub fn remote_key(&self) -> String {
        remote_key_for(&self.package.name)
    }

    /// Packages installed on top of the project's own dependencies.
    pub fn extra_packages(&self) -> Vec<ExtraPackage> {
        vec![
            ExtraPackage::new(&self.package.name, &self.package.version),
            ExtraPackage::new(&self.package.themes_name, &self.package.themes_version),
        ]
    }
}

/// Derives the storage key from an npm package name.
///
/// The mapping is injective over valid names: unscoped names cannot start
/// with `@`, and a scoped name keeps both of its segments.
pub fn remote_key_for(package_name: &str) -> String {
    match package_name.strip_prefix('@').and_then(|rest| rest.split_once('/')) {
        Some((scope, name)) => format!("@{}/{}", scope, name),
        None => package_name.to_string(),
    }
}

fn dedup_preserving_order(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(item.clone())).collect()
}

fn deserialize_components<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(dedup_preserving_order(raw.into_iter()))
}

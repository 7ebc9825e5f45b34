//! Request validation.
//!
//! Package names and versions end up as arguments to the package installer,
//! and component names select template files, so everything is checked
//! against an allowlist before a workspace is allocated.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::RequestError;

use super::types::GenerationRequest;

/// npm package names: optional `@scope/`, lowercase, url-safe characters.
fn package_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:@[a-z0-9][a-z0-9._~-]*/)?[a-z0-9][a-z0-9._~-]*$")
            .expect("package name pattern is valid")
    })
}

/// Validates an npm package name.
pub fn validate_package_name(name: &str) -> Result<(), RequestError> {
    if name.len() > 214 || !package_name_pattern().is_match(name) {
        return Err(RequestError::InvalidPackageName(name.to_string()));
    }
    Ok(())
}

/// Validates an exact semantic version.
pub fn validate_version(package: &str, version: &str) -> Result<(), RequestError> {
    semver::Version::parse(version)
        .map(|_| ())
        .map_err(|e| RequestError::InvalidVersion {
            package: package.to_string(),
            version: version.to_string(),
            message: e.to_string(),
        })
}

/// Validates a component name.
pub fn validate_component_name(name: &str) -> Result<(), RequestError> {
    if name.is_empty()
        || !name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(RequestError::InvalidComponentName(name.to_string()));
    }
    Ok(())
}

impl GenerationRequest {
    /// Checks every field that reaches the filesystem or a subprocess.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.id.trim().is_empty() {
            return Err(RequestError::MissingField("id"));
        }
        if self.project_name.trim().is_empty() {
            return Err(RequestError::MissingField("projectName"));
        }

        validate_package_name(&self.package.name)?;
        validate_version(&self.package.name, &self.package.version)?;
        validate_package_name(&self.package.themes_name)?;
        validate_version(&self.package.themes_name, &self.package.themes_version)?;

        for component in &self.components {
            validate_component_name(component)?;
        }

        Ok(())
    }
}

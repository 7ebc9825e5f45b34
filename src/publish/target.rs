//! Where published documentation lands.

use std::fmt;
use std::path::{Path, PathBuf};

/// Default key prefix under the bucket or local root.
pub const DEFAULT_STORAGE_PREFIX: &str = "docs";

/// Storage backend for published sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTarget {
    /// Object storage, synced with the `aws` CLI.
    S3 { bucket: String, prefix: String },
    /// A directory on the local filesystem, mirrored in-process.
    Local { root: PathBuf, prefix: String },
}

impl StorageTarget {
    pub fn s3(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::S3 {
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    pub fn local(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self::Local {
            root: root.into(),
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        match self {
            Self::S3 { prefix, .. } | Self::Local { prefix, .. } => prefix,
        }
    }

    /// `<prefix>/<key>` with empty segments dropped.
    pub fn object_path(&self, remote_key: &str) -> String {
        let prefix = self.prefix().trim_matches('/');
        if prefix.is_empty() {
            remote_key.to_string()
        } else {
            format!("{}/{}", prefix, remote_key)
        }
    }

    /// URL path the published site is served under, e.g. `/docs/@acme/ui/`.
    pub fn site_path(&self, remote_key: &str) -> String {
        format!("/{}/", self.object_path(remote_key))
    }

    /// Human-readable destination for logs and errors.
    pub fn location(&self, remote_key: &str) -> String {
        match self {
            Self::S3 { bucket, .. } => {
                format!("s3://{}/{}/", bucket, self.object_path(remote_key))
            }
            Self::Local { .. } => self.local_destination(remote_key).display().to_string(),
        }
    }

    /// Directory a local target mirrors into. For S3 targets this is only
    /// meaningful as a relative path.
    pub fn local_destination(&self, remote_key: &str) -> PathBuf {
        let base = match self {
            Self::Local { root, .. } => root.clone(),
            Self::S3 { .. } => PathBuf::new(),
        };
        base.join(self.object_path(remote_key))
    }

    /// Public base URL the published tree is served from.
    pub fn default_base_url(&self) -> String {
        match self {
            Self::S3 { bucket, .. } => format!("https://{}.s3.amazonaws.com", bucket),
            Self::Local { root, .. } => format!("file://{}", absolute_display(root)),
        }
    }

    /// Link to the published entry page.
    ///
    /// `base_url` overrides the target's default (CDN or custom domain).
    pub fn documentation_link(&self, remote_key: &str, base_url: Option<&str>) -> String {
        let base = base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| self.default_base_url());
        format!("{}/{}/index.html", base, self.object_path(remote_key))
    }
}

impl fmt::Display for StorageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S3 { bucket, prefix } => write!(f, "s3://{}/{}", bucket, prefix),
            Self::Local { root, prefix } => write!(f, "{}", root.join(prefix).display()),
        }
    }
}

fn absolute_display(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_location_and_link() {
        let target = StorageTarget::s3("acme-docs", "docs");
        assert_eq!(target.location("acme-ui"), "s3://acme-docs/docs/acme-ui/");
        assert_eq!(
            target.documentation_link("acme-ui", None),
            "https://acme-docs.s3.amazonaws.com/docs/acme-ui/index.html"
        );
    }

    #[test]
    fn test_base_url_override() {
        let target = StorageTarget::s3("acme-docs", "docs");
        assert_eq!(
            target.documentation_link("acme-ui", Some("https://docs.acme.dev/")),
            "https://docs.acme.dev/docs/acme-ui/index.html"
        );
    }

    #[test]
    fn test_empty_prefix() {
        let target = StorageTarget::s3("acme-docs", "");
        assert_eq!(target.location("acme-ui"), "s3://acme-docs/acme-ui/");
        assert_eq!(
            target.documentation_link("acme-ui", None),
            "https://acme-docs.s3.amazonaws.com/acme-ui/index.html"
        );
    }

    #[test]
    fn test_local_destination() {
        let target = StorageTarget::local("/srv/published", "docs");
        assert_eq!(
            target.local_destination("acme-ui"),
            PathBuf::from("/srv/published/docs/acme-ui")
        );
        assert_eq!(
            target.documentation_link("acme-ui", None),
            "file:///srv/published/docs/acme-ui/index.html"
        );
    }

    #[test]
    fn test_scoped_key_keeps_scope_segment() {
        let target = StorageTarget::s3("acme-docs", "docs");
        assert_eq!(target.location("@acme/ui"), "s3://acme-docs/docs/@acme/ui/");
        assert_eq!(
            target.documentation_link("@acme/ui", None),
            "https://acme-docs.s3.amazonaws.com/docs/@acme/ui/index.html"
        );
    }

    #[test]
    fn test_site_path() {
        assert_eq!(StorageTarget::s3("acme-docs", "docs").site_path("@acme/ui"), "/docs/@acme/ui/");
        assert_eq!(StorageTarget::local("/srv", "").site_path("acme-ui"), "/acme-ui/");
    }
}

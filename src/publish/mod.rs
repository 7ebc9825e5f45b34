//! Artifact publishing.
//!
//! A build output directory is mirrored one-way to `<prefix>/<remote_key>/`
//! on a [`StorageTarget`]: new and changed files are uploaded and remote
//! files with no local counterpart are deleted.
//!
//! # Example
//!
//! ```ignore
//! use docs_forge::publish::{ArtifactPublisher, PublishConfig, StorageTarget};
//!
//! let config = PublishConfig::new(StorageTarget::s3("acme-docs", "docs"));
//! let publisher = ArtifactPublisher::new(config, Arc::new(ProcessRunner::new()));
//! let report = publisher.publish(&build_dir, "acme-ui").await?;
//! println!("{}", report.documentation_link);
//! ```

pub mod mirror;
pub mod publisher;
pub mod target;

pub use mirror::{mirror_directory, MirrorStats};
pub use publisher::{
    ArtifactPublisher, PublishConfig, PublishReport, DEFAULT_PUBLISH_TIMEOUT, STAGE_PUBLISH,
};
pub use target::{StorageTarget, DEFAULT_STORAGE_PREFIX};

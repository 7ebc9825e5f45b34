//! Publishes a built site to its storage target.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, instrument};

use super::mirror::{mirror_directory_with_cancel, MirrorStats};
use super::target::{StorageTarget, DEFAULT_STORAGE_PREFIX};
use crate::error::PublishError;
use crate::execution::{CommandError, CommandRunner, CommandSpec, DEFAULT_MAX_OUTPUT_BYTES};
use crate::metrics::MetricsCollector;

/// Default publish timeout (10 minutes).
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(600);

/// Metrics stage label for publishing.
pub const STAGE_PUBLISH: &str = "publish";

/// Publisher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishConfig {
    pub target: StorageTarget,
    /// Sync utility executable for S3 targets.
    pub aws_program: String,
    pub timeout: Duration,
    pub max_output_bytes: usize,
    /// Overrides the target's default base URL in documentation links.
    pub docs_base_url: Option<String>,
}

impl PublishConfig {
    pub fn new(target: StorageTarget) -> Self {
        Self {
            target,
            aws_program: "aws".to_string(),
            timeout: DEFAULT_PUBLISH_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            docs_base_url: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_docs_base_url(mut self, url: impl Into<String>) -> Self {
        self.docs_base_url = Some(url.into());
        self
    }

    /// Link to the entry page of a published site.
    pub fn documentation_link(&self, remote_key: &str) -> String {
        self.target
            .documentation_link(remote_key, self.docs_base_url.as_deref())
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self::new(StorageTarget::local("./published", DEFAULT_STORAGE_PREFIX))
    }
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    pub remote_key: String,
    pub location: String,
    pub documentation_link: String,
    /// Populated for local targets; the S3 sync utility reports no counts.
    pub stats: Option<MirrorStats>,
    pub duration_ms: u64,
}

/// Mirrors build output directories to the configured storage target.
pub struct ArtifactPublisher {
    config: PublishConfig,
    runner: Arc<dyn CommandRunner>,
    metrics: MetricsCollector,
}

impl ArtifactPublisher {
    pub fn new(config: PublishConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            runner,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Mirrors `build_dir` to `<prefix>/<remote_key>/` on the target.
    ///
    /// Remote files with no local counterpart are deleted, so publishing the
    /// same tree twice changes nothing the second time.
    #[instrument(skip(self, build_dir), fields(build_dir = %build_dir.display()))]
    pub async fn publish(
        &self,
        build_dir: &Path,
        remote_key: &str,
    ) -> Result<PublishReport, PublishError> {
        validate_remote_key(remote_key)?;
        let is_dir = tokio::fs::metadata(build_dir)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(PublishError::MissingOutput(build_dir.to_path_buf()));
        }

        let location = self.config.target.location(remote_key);
        info!(location = %location, "Publishing documentation");

        let start = Instant::now();
        let result = match &self.config.target {
            StorageTarget::S3 { .. } => self
                .sync_s3(build_dir, &location)
                .await
                .map(|()| None),
            StorageTarget::Local { .. } => {
                let dest = self.config.target.local_destination(remote_key);
                self.mirror_local(build_dir.to_path_buf(), dest)
                    .await
                    .map(Some)
            }
        };
        let elapsed = start.elapsed();
        self.metrics
            .record_stage(STAGE_PUBLISH, result.is_ok(), elapsed.as_secs_f64());

        match result {
            Ok(stats) => {
                info!(
                    location = %location,
                    duration_ms = elapsed.as_millis() as u64,
                    "Published documentation"
                );
                Ok(PublishReport {
                    remote_key: remote_key.to_string(),
                    location,
                    documentation_link: self.config.documentation_link(remote_key),
                    stats,
                    duration_ms: elapsed.as_millis() as u64,
                })
            }
            Err(e) => {
                error!(
                    location = %location,
                    error = %e,
                    diagnostics = e.diagnostics().unwrap_or(""),
                    "Publish failed"
                );
                Err(e)
            }
        }
    }

    async fn sync_s3(&self, build_dir: &Path, location: &str) -> Result<(), PublishError> {
        let spec = CommandSpec::new(&self.config.aws_program)
            .args(["s3", "sync"])
            .arg(build_dir.to_string_lossy())
            .args([location, "--delete", "--no-progress"])
            .with_timeout(self.config.timeout)
            .with_max_output_bytes(self.config.max_output_bytes);

        match self.runner.run(&spec).await {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => Err(PublishError::SyncFailed {
                location: location.to_string(),
                message: format!("'{}' exited with code {}", spec, output.exit_code),
                diagnostics: output.diagnostics(),
            }),
            Err(CommandError::Timeout {
                timeout, partial, ..
            }) => Err(PublishError::Timeout {
                timeout,
                diagnostics: partial.diagnostics(),
            }),
            Err(e) => Err(PublishError::SyncFailed {
                location: location.to_string(),
                message: e.to_string(),
                diagnostics: String::new(),
            }),
        }
    }

    async fn mirror_local(&self, source: PathBuf, dest: PathBuf) -> Result<MirrorStats, PublishError> {
        let timeout = self.config.timeout;
        let cancel = Arc::new(AtomicBool::new(false));
        let task_cancel = Arc::clone(&cancel);

        let mut task = tokio::task::spawn_blocking(move || {
            mirror_directory_with_cancel(&source, &dest, &task_cancel)
        });

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(PublishError::SyncFailed {
                location: "local mirror".to_string(),
                message: e.to_string(),
                diagnostics: String::new(),
            }),
            Err(_) => {
                cancel.store(true, Ordering::SeqCst);
                let _ = task.await;
                Err(PublishError::Timeout {
                    timeout,
                    diagnostics: String::new(),
                })
            }
        }
    }
}

/// Remote keys are either one path segment (`acme-ui`) or a scope and a
/// name (`@acme/ui`) under the storage prefix.
fn validate_remote_key(key: &str) -> Result<(), PublishError> {
    let valid = match key.strip_prefix('@') {
        Some(scoped) => scoped
            .split_once('/')
            .is_some_and(|(scope, name)| is_key_segment(scope) && is_key_segment(name)),
        None => is_key_segment(key),
    };
    if valid {
        Ok(())
    } else {
        Err(PublishError::InvalidKey(key.to_string()))
    }
}

fn is_key_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::CommandOutput;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct MockRunner {
        exit_code: i32,
        stderr: String,
        calls: Mutex<Vec<CommandSpec>>,
        call_count: AtomicUsize,
    }

    impl MockRunner {
        fn new(exit_code: i32, stderr: &str) -> Self {
            Self {
                exit_code,
                stderr: stderr.to_string(),
                calls: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for MockRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().expect("lock poisoned").push(spec.clone());
            Ok(CommandOutput::new(self.exit_code, "", self.stderr.clone()))
        }
    }

    fn build_dir() -> TempDir {
        let dir = TempDir::new().expect("failed to create temp dir");
        std::fs::write(dir.path().join("index.html"), "<h1>Docs</h1>").unwrap();
        dir
    }

    #[test]
    fn test_validate_remote_key() {
        assert!(validate_remote_key("acme-ui").is_ok());
        assert!(validate_remote_key("ui.v2").is_ok());
        assert!(validate_remote_key("").is_err());
        assert!(validate_remote_key("..").is_err());
        assert!(validate_remote_key("@acme/ui").is_ok());
        assert!(validate_remote_key("acme/ui").is_err());
        assert!(validate_remote_key("@acme").is_err());
        assert!(validate_remote_key("@acme/").is_err());
        assert!(validate_remote_key("@acme/ui/extra").is_err());
        assert!(validate_remote_key("@../ui").is_err());
    }

    #[tokio::test]
    async fn test_s3_publish_invokes_sync() {
        let build = build_dir();
        let runner = Arc::new(MockRunner::new(0, ""));
        let config = PublishConfig::new(StorageTarget::s3("acme-docs", "docs"));
        let publisher = ArtifactPublisher::new(config, runner.clone());

        let report = publisher.publish(build.path(), "acme-ui").await.unwrap();

        assert_eq!(report.location, "s3://acme-docs/docs/acme-ui/");
        assert_eq!(
            report.documentation_link,
            "https://acme-docs.s3.amazonaws.com/docs/acme-ui/index.html"
        );
        assert!(report.stats.is_none());

        let calls = runner.calls.lock().expect("lock poisoned");
        assert_eq!(calls.len(), 1);
        let expected: Vec<String> = vec![
            "s3".to_string(),
            "sync".to_string(),
            build.path().to_string_lossy().into_owned(),
            "s3://acme-docs/docs/acme-ui/".to_string(),
            "--delete".to_string(),
            "--no-progress".to_string(),
        ];
        assert_eq!(calls[0].program, "aws");
        assert_eq!(calls[0].args, expected);
        assert_eq!(calls[0].timeout, DEFAULT_PUBLISH_TIMEOUT);
    }

    #[tokio::test]
    async fn test_s3_sync_failure_carries_diagnostics() {
        let build = build_dir();
        let runner = Arc::new(MockRunner::new(1, "An error occurred (AccessDenied)"));
        let config = PublishConfig::new(StorageTarget::s3("acme-docs", "docs"));
        let publisher = ArtifactPublisher::new(config, runner);

        let err = publisher.publish(build.path(), "acme-ui").await.unwrap_err();

        assert!(matches!(err, PublishError::SyncFailed { .. }));
        assert_eq!(err.diagnostics(), Some("An error occurred (AccessDenied)"));
    }

    #[tokio::test]
    async fn test_missing_build_dir_is_rejected_before_sync() {
        let runner = Arc::new(MockRunner::new(0, ""));
        let config = PublishConfig::new(StorageTarget::s3("acme-docs", "docs"));
        let publisher = ArtifactPublisher::new(config, runner.clone());

        let err = publisher
            .publish(Path::new("/nonexistent/build"), "acme-ui")
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::MissingOutput(_)));
        assert_eq!(runner.call_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_local_publish_is_idempotent() {
        let build = build_dir();
        let storage = TempDir::new().expect("failed to create temp dir");
        let config = PublishConfig::new(StorageTarget::local(storage.path(), "docs"));
        let publisher = ArtifactPublisher::new(config, Arc::new(MockRunner::new(0, "")));

        let first = publisher.publish(build.path(), "acme-ui").await.unwrap();
        let second = publisher.publish(build.path(), "acme-ui").await.unwrap();

        assert_eq!(first.stats.map(|s| s.uploaded), Some(1));
        assert!(second.stats.map(|s| s.is_noop()).unwrap_or(false));
        assert!(storage.path().join("docs/acme-ui/index.html").is_file());
    }

    struct StalledSync;

    #[async_trait]
    impl CommandRunner for StalledSync {
        async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
            Err(CommandError::Timeout {
                program: spec.program.clone(),
                timeout: spec.timeout,
                partial: CommandOutput::new(-1, "upload: build/index.html to s3://acme-docs/docs/", ""),
            })
        }
    }

    #[tokio::test]
    async fn test_s3_timeout_carries_partial_output() {
        let build = build_dir();
        let config = PublishConfig::new(StorageTarget::s3("acme-docs", "docs"))
            .with_timeout(Duration::from_millis(750));
        let publisher = ArtifactPublisher::new(config, Arc::new(StalledSync));

        let err = publisher.publish(build.path(), "acme-ui").await.unwrap_err();

        match &err {
            PublishError::Timeout { timeout, .. } => {
                assert_eq!(*timeout, Duration::from_millis(750))
            }
            other => panic!("expected Timeout, got {:?}", other),
        }
        assert!(err.diagnostics().unwrap_or("").contains("upload: build/index.html"));
        assert!(err.to_string().contains("750ms"));
    }

    #[tokio::test]
    async fn test_scoped_and_unscoped_sites_do_not_clobber_each_other() {
        let storage = TempDir::new().expect("failed to create temp dir");
        let config = PublishConfig::new(StorageTarget::local(storage.path(), "docs"));
        let publisher = ArtifactPublisher::new(config, Arc::new(MockRunner::new(0, "")));

        let keys = ["@acme/ui", "acme-ui", "acme", "@acme/ui-core"];
        let builds: Vec<TempDir> = keys.iter().map(|_| build_dir()).collect();
        for (key, build) in keys.iter().zip(&builds) {
            std::fs::write(build.path().join("owner.txt"), key).unwrap();
            publisher.publish(build.path(), key).await.unwrap();
        }

        for key in keys {
            let owner = storage.path().join("docs").join(key).join("owner.txt");
            assert_eq!(std::fs::read_to_string(owner).unwrap(), key);
        }
    }
}

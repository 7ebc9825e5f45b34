//! End-to-end tests for the documentation pipeline.
//!
//! External tools are replaced by a scripted [`CommandRunner`] that behaves
//! like the site builder: on `npm run build` it writes one HTML page per
//! rendered component page into `build/`. Publishing goes to a local storage
//! target so mirror semantics can be observed on disk.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use docs_forge::execution::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use docs_forge::pipeline::{DocsService, ForgeConfig, PipelineError};
use docs_forge::request::GenerationRequest;
use docs_forge::workspace::DEFAULT_WORKSPACE_PREFIX;
use tempfile::TempDir;

// ============================================================================
// Fake site builder
// ============================================================================

/// How a scripted stage should fail.
#[derive(Debug, Clone, Copy)]
enum Failure {
    ExitCode(i32),
    Timeout,
}

/// Stand-in for npm. Stages are identified by their first argument
/// (`ci`, `install`, `run`).
#[derive(Default)]
struct FakeSiteBuilder {
    fail_on: Option<(&'static str, Failure)>,
    calls: Mutex<Vec<CommandSpec>>,
    call_count: AtomicUsize,
    /// Component pages present in the project when compile ran.
    compiled_pages: Mutex<Vec<Vec<String>>>,
}

impl FakeSiteBuilder {
    fn new() -> Self {
        Self::default()
    }

    fn failing(stage: &'static str, failure: Failure) -> Self {
        Self {
            fail_on: Some((stage, failure)),
            ..Self::default()
        }
    }

    fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn stages_run(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|spec| spec.args.first().cloned().unwrap_or_default())
            .collect()
    }

    fn compile(&self, project: &Path) -> std::io::Result<()> {
        let build = project.join("build");
        fs::create_dir_all(build.join("components"))?;
        fs::write(build.join("index.html"), "<h1>Docs</h1>")?;
        if project.join("site.config.json").is_file() {
            fs::copy(project.join("site.config.json"), build.join("site.config.json"))?;
        }

        let mut pages = Vec::new();
        let components = project.join("docs/components");
        if components.is_dir() {
            for entry in fs::read_dir(&components)? {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if !name.ends_with(".mdx") {
                    continue;
                }
                let content = fs::read_to_string(entry.path())?;
                let stem = name.split('.').next().unwrap_or(&name).to_string();
                fs::write(build.join("components").join(format!("{}.html", stem)), content)?;
                pages.push(name);
            }
        }
        pages.sort();
        self.compiled_pages.lock().expect("lock poisoned").push(pages);
        Ok(())
    }
}

#[async_trait]
impl CommandRunner for FakeSiteBuilder {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().expect("lock poisoned").push(spec.clone());
        let stage = spec.args.first().map(String::as_str).unwrap_or_default();

        if let Some((failing, failure)) = self.fail_on {
            if failing == stage {
                return match failure {
                    Failure::ExitCode(code) => Ok(CommandOutput::new(code, "", "npm ERR! boom")),
                    Failure::Timeout => Err(CommandError::Timeout {
                        program: spec.program.clone(),
                        timeout: spec.timeout,
                        partial: CommandOutput::new(-1, "[webpack] compiling 42%", ""),
                    }),
                };
            }
        }

        if stage == "ci" {
            let project = spec.working_dir.clone().expect("stages run in the project");
            if !project.join("package-lock.json").is_file() {
                return Ok(CommandOutput::new(
                    1,
                    "",
                    "npm ERR! `npm ci` can only install with an existing package-lock.json",
                ));
            }
        }

        if stage == "run" {
            let project = spec.working_dir.clone().expect("stages run in the project");
            self.compile(&project).map_err(|e| CommandError::Io {
                program: spec.program.clone(),
                source: e,
            })?;
        }

        Ok(CommandOutput::new(0, format!("{} ok", stage), ""))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

struct Fixture {
    templates: TempDir,
    temp_root: TempDir,
    storage: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let fixture = Self {
            templates: TempDir::new().expect("failed to create temp dir"),
            temp_root: TempDir::new().expect("failed to create temp dir"),
            storage: TempDir::new().expect("failed to create temp dir"),
        };
        let root = fixture.templates.path();
        write(root, "package.json.tera", r#"{"name": "{{ remoteKey }}-docs", "private": true}"#);
        write(
            root,
            "package-lock.json.tera",
            r#"{"name": "{{ remoteKey }}-docs", "lockfileVersion": 3, "packages": {"": {}}}"#,
        );
        write(root, "docs/intro.md.tera", "# {{ projectName }} {{ packageVersion }}");
        write(root, "static/logo.svg", "<svg/>");
        for component in ["Button", "Link", "Checkbox"] {
            write(
                root,
                &format!("docs/components/{}.mdx.tera", component),
                &format!("import {{ {} }} from '{{{{ packageName }}}}';", component),
            );
        }
        fixture
    }

    fn config(&self) -> ForgeConfig {
        ForgeConfig::default()
            .with_template_root(self.templates.path())
            .with_temp_root(self.temp_root.path())
            .with_npm_cache(self.temp_root.path().join("npm-cache"))
            .with_local_storage(self.storage.path())
    }

    fn workspaces(&self) -> Vec<PathBuf> {
        fs::read_dir(self.temp_root.path())
            .expect("temp root readable")
            .filter_map(Result::ok)
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .starts_with(DEFAULT_WORKSPACE_PREFIX)
            })
            .map(|e| e.path())
            .collect()
    }

    fn published(&self, relative: &str) -> PathBuf {
        self.storage.path().join("docs/@acme/ui").join(relative)
    }
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("has parent")).expect("create parent");
    fs::write(path, content).expect("write fixture");
}

fn request(id: &str, components: &[&str]) -> GenerationRequest {
    let components: Vec<String> = components.iter().map(|c| format!("\"{}\"", c)).collect();
    GenerationRequest::from_json(&format!(
        r#"{{
            "id": "{}",
            "npm": {{ "name": "@acme/ui", "version": "2.3.1",
                      "themesName": "@acme/themes", "themesVersion": "1.0.0" }},
            "projectName": "Acme UI",
            "components": [{}]
        }}"#,
        id,
        components.join(", ")
    ))
    .expect("valid request json")
}

async fn service(fixture: &Fixture, runner: Arc<FakeSiteBuilder>) -> DocsService {
    DocsService::initialize_with_runner(fixture.config(), runner)
        .await
        .expect("service initializes")
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_generates_only_requested_component_pages() {
    let fixture = Fixture::new();
    let runner = Arc::new(FakeSiteBuilder::new());
    let service = service(&fixture, runner.clone()).await;

    let result = service
        .generate(&request("req-1", &["Button", "Link"]))
        .await
        .expect("pipeline succeeds");

    let compiled = runner.compiled_pages.lock().expect("lock poisoned").clone();
    assert_eq!(compiled, vec![vec!["Button.mdx".to_string(), "Link.mdx".to_string()]]);

    assert_eq!(result.request_id, "req-1");
    assert_eq!(result.components_count, 2);
    let expected_link = format!(
        "file://{}/docs/@acme/ui/index.html",
        std::path::absolute(fixture.storage.path()).unwrap().display()
    );
    assert_eq!(result.documentation_link, expected_link);

    assert!(fixture.published("index.html").is_file());
    assert_eq!(
        fs::read_to_string(fixture.published("components/Button.html")).unwrap(),
        "import { Button } from '@acme/ui';"
    );
    assert!(!fixture.published("components/Checkbox.html").exists());

    assert!(fixture.workspaces().is_empty(), "workspace must be released");
    assert_eq!(runner.stages_run(), vec!["ci", "install", "run"]);
}

#[tokio::test]
async fn test_shipped_template_tree_builds_under_its_site_path() {
    let fixture = Fixture::new();
    let runner = Arc::new(FakeSiteBuilder::new());
    let config = fixture
        .config()
        .with_template_root(Path::new(env!("CARGO_MANIFEST_DIR")).join("templates"));
    let service = DocsService::initialize_with_runner(config, runner.clone())
        .await
        .expect("service initializes");

    service
        .generate(&request("req-1", &["Button", "Link"]))
        .await
        .expect("pipeline succeeds");

    assert_eq!(runner.stages_run(), vec!["ci", "install", "run"]);
    let compiled = runner.compiled_pages.lock().expect("lock poisoned").clone();
    assert_eq!(compiled, vec![vec!["Button.mdx".to_string(), "Link.mdx".to_string()]]);

    let site: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(fixture.published("site.config.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(site["baseUrl"], "/docs/@acme/ui/");
    assert_eq!(site["title"], "Acme UI");
}

#[tokio::test]
async fn test_extras_stage_installs_pinned_packages() {
    let fixture = Fixture::new();
    let runner = Arc::new(FakeSiteBuilder::new());
    let service = service(&fixture, runner.clone()).await;

    service
        .generate(&request("req-1", &["Button"]))
        .await
        .expect("pipeline succeeds");

    let calls = runner.calls.lock().expect("lock poisoned");
    let extras = &calls[1];
    assert_eq!(extras.program, "npm");
    assert!(extras.args.contains(&"--no-save".to_string()));
    assert!(extras.args.ends_with(&[
        "@acme/ui@2.3.1".to_string(),
        "@acme/themes@1.0.0".to_string()
    ]));
    let cache = extras
        .args
        .iter()
        .position(|a| a == "--cache")
        .map(|i| PathBuf::from(&extras.args[i + 1]))
        .expect("cache argument");
    assert!(cache.is_absolute());
}

#[tokio::test]
async fn test_result_serializes_to_outbound_shape() {
    let fixture = Fixture::new();
    let service = service(&fixture, Arc::new(FakeSiteBuilder::new())).await;

    let result = service
        .generate(&request("req-9", &["Link"]))
        .await
        .expect("pipeline succeeds");

    let json = serde_json::to_value(&result).unwrap();
    for key in ["outputPath", "projectId", "generatedAt", "componentsCount", "documentationLink"] {
        assert!(json.get(key).is_some(), "missing {}", key);
    }
    assert_eq!(json["projectId"], "req-9");
}

// ============================================================================
// Cleanup totality
// ============================================================================

async fn assert_fails_and_cleans_up(
    fixture: &Fixture,
    runner: Arc<FakeSiteBuilder>,
) -> PipelineError {
    let service = service(fixture, runner).await;
    let err = service
        .generate(&request("req-1", &["Button", "Link"]))
        .await
        .expect_err("pipeline fails");
    assert!(
        fixture.workspaces().is_empty(),
        "workspace leaked after {}",
        err
    );
    err
}

#[tokio::test]
async fn test_install_failure_releases_workspace() {
    let fixture = Fixture::new();
    let runner = Arc::new(FakeSiteBuilder::failing("ci", Failure::ExitCode(1)));

    let err = assert_fails_and_cleans_up(&fixture, runner.clone()).await;

    match err {
        PipelineError::Build(e) => {
            assert_eq!(e.stage, "install");
            assert!(e.diagnostics.contains("npm ERR! boom"));
        }
        other => panic!("expected build error, got {:?}", other),
    }
    assert_eq!(runner.call_count(), 1, "later stages must not run");
}

#[tokio::test]
async fn test_extras_failure_releases_workspace() {
    let fixture = Fixture::new();
    let runner = Arc::new(FakeSiteBuilder::failing("install", Failure::ExitCode(1)));

    let err = assert_fails_and_cleans_up(&fixture, runner.clone()).await;

    assert!(matches!(err, PipelineError::Build(ref e) if e.stage == "install-extras"));
    assert_eq!(runner.call_count(), 2);
}

#[tokio::test]
async fn test_compile_timeout_releases_workspace() {
    let fixture = Fixture::new();
    let runner = Arc::new(FakeSiteBuilder::failing("run", Failure::Timeout));

    let err = assert_fails_and_cleans_up(&fixture, runner).await;

    match err {
        PipelineError::Build(e) => {
            assert_eq!(e.stage, "compile");
            assert!(e.message.contains("timed out"));
            assert!(e.diagnostics.contains("compiling 42%"));
        }
        other => panic!("expected build error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_render_failure_releases_workspace() {
    let fixture = Fixture::new();
    write(fixture.templates.path(), "docs/broken.md.tera", "{{ unclosed");
    let runner = Arc::new(FakeSiteBuilder::new());

    let err = assert_fails_and_cleans_up(&fixture, runner.clone()).await;

    assert!(matches!(err, PipelineError::Template(_)));
    assert_eq!(err.summary(), "Failed to render documentation templates");
    assert_eq!(runner.call_count(), 0, "nothing is built after a render failure");
}

#[tokio::test]
async fn test_publish_failure_releases_workspace() {
    let fixture = Fixture::new();
    // A regular file where the storage prefix directory should go.
    fs::write(fixture.storage.path().join("docs"), "not a directory").unwrap();
    let runner = Arc::new(FakeSiteBuilder::new());

    let err = assert_fails_and_cleans_up(&fixture, runner.clone()).await;

    assert!(matches!(err, PipelineError::Publish(_)));
    assert_eq!(runner.call_count(), 3);
}

#[tokio::test]
async fn test_acquire_failure_has_nothing_to_clean() {
    let fixture = Fixture::new();
    let scratch = fixture.temp_root.path().join("scratch");
    fs::create_dir_all(&scratch).unwrap();
    let runner = Arc::new(FakeSiteBuilder::new());

    let config = fixture.config().with_temp_root(&scratch);
    let service = DocsService::initialize_with_runner(config, runner.clone())
        .await
        .expect("service initializes against a usable root");

    // The root turns into a regular file after startup.
    fs::remove_dir_all(&scratch).unwrap();
    fs::write(&scratch, "not a directory").unwrap();

    let err = service
        .generate(&request("req-1", &["Button"]))
        .await
        .expect_err("acquire fails");

    assert!(matches!(err, PipelineError::Workspace(_)));
    assert_eq!(err.summary(), "Failed to allocate a workspace");
    assert_eq!(runner.call_count(), 0);
    assert!(fixture.workspaces().is_empty());
    assert!(scratch.is_file());
}

#[tokio::test]
async fn test_invalid_request_acquires_nothing() {
    let fixture = Fixture::new();
    let runner = Arc::new(FakeSiteBuilder::new());
    let service = service(&fixture, runner.clone()).await;

    let mut bad = request("req-1", &["Button"]);
    bad.package.version = "latest".to_string();

    let err = service.generate(&bad).await.expect_err("validation fails");

    assert!(matches!(err, PipelineError::InvalidRequest(_)));
    assert!(fixture.workspaces().is_empty());
    assert_eq!(runner.call_count(), 0);
}

// ============================================================================
// Publishing semantics
// ============================================================================

#[tokio::test]
async fn test_republish_removes_dropped_component() {
    let fixture = Fixture::new();
    let service = service(&fixture, Arc::new(FakeSiteBuilder::new())).await;

    service
        .generate(&request("req-1", &["Button", "Link"]))
        .await
        .expect("first run succeeds");
    assert!(fixture.published("components/Link.html").is_file());

    service
        .generate(&request("req-2", &["Button"]))
        .await
        .expect("second run succeeds");

    assert!(fixture.published("components/Button.html").is_file());
    assert!(!fixture.published("components/Link.html").exists());
}

#[tokio::test]
async fn test_republish_unchanged_site_is_stable() {
    let fixture = Fixture::new();
    let service = service(&fixture, Arc::new(FakeSiteBuilder::new())).await;

    let first = service
        .generate(&request("req-1", &["Button", "Link"]))
        .await
        .expect("first run succeeds");
    let before = fs::read_to_string(fixture.published("components/Link.html")).unwrap();

    let second = service
        .generate(&request("req-1", &["Link", "Button"]))
        .await
        .expect("second run succeeds");

    assert_eq!(first.documentation_link, second.documentation_link);
    assert_eq!(
        fs::read_to_string(fixture.published("components/Link.html")).unwrap(),
        before
    );
}

// ============================================================================
// Concurrency and recovery
// ============================================================================

#[tokio::test]
async fn test_concurrent_requests_use_distinct_workspaces() {
    let fixture = Fixture::new();
    let runner = Arc::new(FakeSiteBuilder::new());
    let service = service(&fixture, runner.clone()).await;

    let requests = vec![
        request("req-a", &["Button"]),
        request("req-b", &["Link"]),
        request("req-c", &["Checkbox"]),
    ];
    let results = service.generate_all(&requests).await;

    assert!(results.iter().all(Result::is_ok));
    let projects: HashSet<PathBuf> = runner
        .calls
        .lock()
        .expect("lock poisoned")
        .iter()
        .filter_map(|spec| spec.working_dir.clone())
        .collect();
    assert_eq!(projects.len(), 3);
    assert!(fixture.workspaces().is_empty());
}

#[tokio::test]
async fn test_initialize_sweeps_orphans() {
    let fixture = Fixture::new();
    let root = fixture.temp_root.path();
    for name in ["docs-forge-req-1-aaaa", "docs-forge-req-2-bbbb", "docs-forge-req-3-cccc"] {
        write(root, &format!("{}/project/package.json", name), "{}");
    }
    write(root, "docs-forge-stray.lock", "");
    write(root, "unrelated/keep.txt", "keep");

    let service = service(&fixture, Arc::new(FakeSiteBuilder::new())).await;

    assert_eq!(service.last_sweep().removed_count(), 4);
    assert_eq!(service.last_sweep().failed_count(), 0);
    assert!(fixture.workspaces().is_empty());
    assert!(root.join("unrelated/keep.txt").is_file());
}

#[tokio::test]
async fn test_render_timeout_is_configurable() {
    let fixture = Fixture::new();
    let config = fixture
        .config()
        .with_render_timeout(Duration::from_secs(30));
    let service = DocsService::initialize_with_runner(config, Arc::new(FakeSiteBuilder::new()))
        .await
        .expect("service initializes");

    assert_eq!(service.config().render_timeout, Duration::from_secs(30));
    service
        .generate(&request("req-1", &["Button"]))
        .await
        .expect("render completes well within the timeout");
}

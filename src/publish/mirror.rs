//! One-way directory mirroring with content hashing.
//!
//! Files are compared by size and SHA-256, so re-publishing an unchanged
//! tree writes nothing. Anything in the destination that has no
//! counterpart in the source is removed.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::PublishError;

/// What a mirror pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorStats {
    /// Files written because they were new or changed.
    pub uploaded: usize,
    /// Files already identical at the destination.
    pub unchanged: usize,
    /// Destination entries removed because the source no longer has them.
    pub deleted: usize,
}

impl MirrorStats {
    /// True if the pass wrote or deleted nothing.
    pub fn is_noop(&self) -> bool {
        self.uploaded == 0 && self.deleted == 0
    }
}

/// Mirrors `source` into `dest`.
pub fn mirror_directory(source: &Path, dest: &Path) -> Result<MirrorStats, PublishError> {
    let never = AtomicBool::new(false);
    mirror_directory_with_cancel(source, dest, &never)
}

/// Mirrors `source` into `dest`, stopping early once `cancel` is set.
pub(crate) fn mirror_directory_with_cancel(
    source: &Path,
    dest: &Path,
    cancel: &AtomicBool,
) -> Result<MirrorStats, PublishError> {
    if !source.is_dir() {
        return Err(PublishError::MissingOutput(source.to_path_buf()));
    }
    fs::create_dir_all(dest).map_err(|e| io_error(dest, e))?;

    let mut stats = MirrorStats::default();
    let mut present: HashSet<PathBuf> = HashSet::new();

    for entry in WalkDir::new(source)
        .follow_links(false)
        .sort_by_file_name()
        .min_depth(1)
    {
        check_cancel(cancel, source)?;
        let entry = entry.map_err(|e| walk_error(source, e))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .unwrap_or(entry.path())
            .to_path_buf();
        let target = dest.join(&relative);

        if entry.file_type().is_dir() {
            if target.exists() && !target.is_dir() {
                fs::remove_file(&target).map_err(|e| io_error(&target, e))?;
                stats.deleted += 1;
            }
            fs::create_dir_all(&target).map_err(|e| io_error(&target, e))?;
        } else if entry.file_type().is_file() {
            if target.is_dir() {
                fs::remove_dir_all(&target).map_err(|e| io_error(&target, e))?;
                stats.deleted += 1;
            }
            if same_contents(entry.path(), &target)? {
                stats.unchanged += 1;
            } else {
                fs::copy(entry.path(), &target).map_err(|e| io_error(&target, e))?;
                debug!(path = %relative.display(), "Uploaded file");
                stats.uploaded += 1;
            }
        } else {
            continue;
        }

        present.insert(relative);
    }

    // Children come before their parents, so emptied directories can be
    // removed with remove_dir.
    for entry in WalkDir::new(dest)
        .follow_links(false)
        .contents_first(true)
        .min_depth(1)
    {
        check_cancel(cancel, source)?;
        let entry = entry.map_err(|e| walk_error(dest, e))?;
        let relative = entry.path().strip_prefix(dest).unwrap_or(entry.path());
        if present.contains(relative) {
            continue;
        }

        if entry.file_type().is_dir() {
            fs::remove_dir(entry.path()).map_err(|e| io_error(entry.path(), e))?;
        } else {
            fs::remove_file(entry.path()).map_err(|e| io_error(entry.path(), e))?;
            stats.deleted += 1;
        }
        debug!(path = %relative.display(), "Deleted stale entry");
    }

    info!(
        source = %source.display(),
        dest = %dest.display(),
        uploaded = stats.uploaded,
        unchanged = stats.unchanged,
        deleted = stats.deleted,
        "Mirrored directory"
    );

    Ok(stats)
}

fn same_contents(a: &Path, b: &Path) -> Result<bool, PublishError> {
    let Ok(b_meta) = fs::metadata(b) else {
        return Ok(false);
    };
    let a_meta = fs::metadata(a).map_err(|e| io_error(a, e))?;
    if a_meta.len() != b_meta.len() {
        return Ok(false);
    }
    Ok(file_digest(a)? == file_digest(b)?)
}

fn file_digest(path: &Path) -> Result<Vec<u8>, PublishError> {
    let mut file = File::open(path).map_err(|e| io_error(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| io_error(path, e))?;
    Ok(hasher.finalize().to_vec())
}

fn check_cancel(cancel: &AtomicBool, source: &Path) -> Result<(), PublishError> {
    if cancel.load(Ordering::SeqCst) {
        return Err(io_error(
            source,
            io::Error::new(io::ErrorKind::Interrupted, "mirror cancelled"),
        ));
    }
    Ok(())
}

fn io_error(path: &Path, source: io::Error) -> PublishError {
    PublishError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn walk_error(root: &Path, err: walkdir::Error) -> PublishError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::other("filesystem loop detected"));
    PublishError::Io { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn site() -> TempDir {
        let dir = TempDir::new().expect("failed to create temp dir");
        write(dir.path(), "index.html", "<h1>Acme UI</h1>");
        write(dir.path(), "docs/components/button/index.html", "Button");
        write(dir.path(), "docs/components/link/index.html", "Link");
        write(dir.path(), "assets/main.css", "body {}");
        dir
    }

    #[test]
    fn test_first_mirror_uploads_everything() {
        let source = site();
        let dest = TempDir::new().expect("failed to create temp dir");

        let stats = mirror_directory(source.path(), dest.path()).unwrap();

        assert_eq!(stats.uploaded, 4);
        assert_eq!(stats.deleted, 0);
        assert_eq!(
            fs::read_to_string(dest.path().join("docs/components/link/index.html")).unwrap(),
            "Link"
        );
    }

    #[test]
    fn test_second_mirror_is_noop() {
        let source = site();
        let dest = TempDir::new().expect("failed to create temp dir");

        mirror_directory(source.path(), dest.path()).unwrap();
        let stats = mirror_directory(source.path(), dest.path()).unwrap();

        assert!(stats.is_noop());
        assert_eq!(stats.unchanged, 4);
    }

    #[test]
    fn test_removed_source_file_is_deleted() {
        let source = site();
        let dest = TempDir::new().expect("failed to create temp dir");
        mirror_directory(source.path(), dest.path()).unwrap();

        fs::remove_dir_all(source.path().join("docs/components/link")).unwrap();
        let stats = mirror_directory(source.path(), dest.path()).unwrap();

        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.uploaded, 0);
        assert!(!dest.path().join("docs/components/link").exists());
        assert!(dest.path().join("docs/components/button/index.html").exists());
    }

    #[test]
    fn test_changed_file_is_uploaded() {
        let source = site();
        let dest = TempDir::new().expect("failed to create temp dir");
        mirror_directory(source.path(), dest.path()).unwrap();

        write(source.path(), "index.html", "<h1>Acme UI 2</h1>");
        let stats = mirror_directory(source.path(), dest.path()).unwrap();

        assert_eq!(stats.uploaded, 1);
        assert_eq!(stats.unchanged, 3);
        assert_eq!(
            fs::read_to_string(dest.path().join("index.html")).unwrap(),
            "<h1>Acme UI 2</h1>"
        );
    }

    #[test]
    fn test_same_size_different_content_is_uploaded() {
        let source = site();
        let dest = TempDir::new().expect("failed to create temp dir");
        mirror_directory(source.path(), dest.path()).unwrap();

        write(source.path(), "assets/main.css", "body [}");
        let stats = mirror_directory(source.path(), dest.path()).unwrap();

        assert_eq!(stats.uploaded, 1);
    }

    #[test]
    fn test_file_replaced_by_directory() {
        let source = site();
        let dest = TempDir::new().expect("failed to create temp dir");
        mirror_directory(source.path(), dest.path()).unwrap();

        fs::remove_file(source.path().join("assets/main.css")).unwrap();
        write(source.path(), "assets/main.css/part.css", "a {}");
        mirror_directory(source.path(), dest.path()).unwrap();

        assert!(dest.path().join("assets/main.css/part.css").is_file());
    }

    #[test]
    fn test_missing_source() {
        let dest = TempDir::new().expect("failed to create temp dir");
        let err = mirror_directory(&dest.path().join("nope"), dest.path()).unwrap_err();
        assert!(matches!(err, PublishError::MissingOutput(_)));
    }

    #[test]
    fn test_cancelled_mirror_stops() {
        let source = site();
        let dest = TempDir::new().expect("failed to create temp dir");
        let cancel = AtomicBool::new(true);

        let err = mirror_directory_with_cancel(source.path(), dest.path(), &cancel).unwrap_err();
        assert!(matches!(err, PublishError::Io { .. }));
        assert!(!dest.path().join("index.html").exists());
    }
}

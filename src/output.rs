//! File-system side of a job: permissions, backups, atomic replacement.

use crate::constants::{
    BACKUP_SUFFIX, REMOVE_ATTEMPTS, REMOVE_RETRY_DELAY_MS, REPLACE_ATTEMPTS,
    REPLACE_RETRY_DELAY_MS, TEMP_FILE_PREFIX,
};
use crate::error::{CompressionError, Result};
use std::ffi::OsString;
use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Make `path` writable if it carries a read-only flag.
pub fn clear_readonly(path: &Path) -> Result<()> {
    let metadata =
        fs::metadata(path).map_err(|_| CompressionError::FileNotFound(path.to_path_buf()))?;
    let mut permissions = metadata.permissions();
    if !permissions.readonly() {
        return Ok(());
    }

    make_writable(&mut permissions);
    fs::set_permissions(path, permissions)
        .map_err(|_| CompressionError::PermissionDenied(path.to_path_buf()))?;
    crate::verbose!("Cleared read-only flag on {:?}", path);
    Ok(())
}

#[cfg(unix)]
fn make_writable(permissions: &mut Permissions) {
    use std::os::unix::fs::PermissionsExt;
    permissions.set_mode(permissions.mode() | 0o200);
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn make_writable(permissions: &mut Permissions) {
    permissions.set_readonly(false);
}

/// `photo.png` -> `photo.png.bak`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".");
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Copy the original next to itself once. An existing backup is never
/// overwritten; failures are reported and otherwise ignored.
pub fn backup_original(path: &Path) -> Option<PathBuf> {
    let backup = backup_path(path);
    if backup.exists() {
        crate::verbose!("Backup already present: {:?}", backup);
        return None;
    }

    match fs::copy(path, &backup) {
        Ok(_) => {
            crate::verbose!("Backed up {:?}", backup);
            Some(backup)
        }
        Err(e) => {
            crate::warn!("Backup of {:?} failed: {}", path, e);
            None
        }
    }
}

/// Write `bytes` to a hidden temp file beside `dest`, then move it over
/// `dest`. Returns the number of bytes written.
pub fn write_atomically(
    dest: &Path,
    bytes: &[u8],
    permissions: Option<Permissions>,
) -> Result<u64> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|_| CompressionError::DirectoryCreationFailed(dir.clone()))?;

    let mut pending = tempfile::Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .suffix(".tmp")
        .tempfile_in(&dir)?;
    pending.write_all(bytes)?;
    pending.as_file().sync_all()?;
    if let Some(permissions) = permissions {
        fs::set_permissions(pending.path(), permissions)?;
    }

    let mut attempt = 1;
    loop {
        match pending.persist(dest) {
            Ok(_) => return Ok(bytes.len() as u64),
            Err(err) if attempt < REPLACE_ATTEMPTS => {
                crate::verbose!("Replace of {:?} failed (attempt {}): {}", dest, attempt, err.error);
                attempt += 1;
                thread::sleep(Duration::from_millis(REPLACE_RETRY_DELAY_MS));
                pending = err.file;
            }
            // The temp file is removed when `err.file` drops.
            Err(err) => {
                return Err(CompressionError::ReplaceFailed(
                    dest.to_path_buf(),
                    attempt,
                    err.error.to_string(),
                ))
            }
        }
    }
}

/// Canonical form of `path`. A missing file is resolved through its
/// parent directory; anything unresolvable is returned as given.
pub fn resolved_path(path: &Path) -> PathBuf {
    if let Ok(real) = fs::canonicalize(path) {
        return real;
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (fs::canonicalize(parent), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}

/// Whether two spellings name the same file. `b` need not exist.
pub fn same_file(a: &Path, b: &Path) -> bool {
    a == b || resolved_path(a) == resolved_path(b)
}

/// Copy a source unchanged to its output location.
pub fn copy_to_output(source: &Path, dest: &Path) -> Result<u64> {
    if same_file(source, dest) {
        return Ok(fs::metadata(source)?.len());
    }
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|_| CompressionError::DirectoryCreationFailed(parent.to_path_buf()))?;
    }
    Ok(fs::copy(source, dest)?)
}

pub fn remove_with_retry(path: &Path) -> Result<()> {
    retry(REMOVE_ATTEMPTS, REMOVE_RETRY_DELAY_MS, || match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    })
    .map_err(CompressionError::from)
}

fn retry<T>(attempts: u32, delay_ms: u64, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(_) if attempt < attempts => {
                attempt += 1;
                thread::sleep(Duration::from_millis(delay_ms));
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backup_path_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("/a/photo.png")),
            PathBuf::from("/a/photo.png.bak")
        );
    }

    #[test]
    fn test_backup_only_once() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.jpg");
        fs::write(&file, b"first").unwrap();

        assert!(backup_original(&file).is_some());
        fs::write(&file, b"second").unwrap();
        assert!(backup_original(&file).is_none());

        assert_eq!(fs::read(backup_path(&file)).unwrap(), b"first");
    }

    #[test]
    fn test_write_atomically_replaces_and_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("out.jpg");
        fs::write(&dest, b"old contents").unwrap();

        let written = write_atomically(&dest, b"new", None).unwrap();
        assert_eq!(written, 3);
        assert_eq!(fs::read(&dest).unwrap(), b"new");

        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_FILE_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_write_atomically_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("nested/deeper/out.jpg");
        write_atomically(&dest, b"abc", None).unwrap();
        assert!(dest.exists());
    }

    #[test]
    fn test_clear_readonly() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("ro.jpg");
        fs::write(&file, b"data").unwrap();

        let mut permissions = fs::metadata(&file).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&file, permissions).unwrap();

        clear_readonly(&file).unwrap();
        assert!(!fs::metadata(&file).unwrap().permissions().readonly());
    }

    #[test]
    fn test_clear_readonly_missing_file() {
        let result = clear_readonly(Path::new("/nonexistent/file.jpg"));
        assert!(matches!(result, Err(CompressionError::FileNotFound(_))));
    }

    #[test]
    fn test_remove_with_retry_tolerates_missing() {
        let temp_dir = TempDir::new().unwrap();
        assert!(remove_with_retry(&temp_dir.path().join("gone.png")).is_ok());
    }

    #[test]
    fn test_retry_gives_up_after_attempts() {
        let mut calls = 0;
        let result: io::Result<()> = retry(3, 0, || {
            calls += 1;
            Err(io::Error::new(io::ErrorKind::Other, "busy"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_copy_to_output() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("a.jpg");
        fs::write(&src, b"12345").unwrap();
        let dest = temp_dir.path().join("out/a.jpg");
        assert_eq!(copy_to_output(&src, &dest).unwrap(), 5);
        assert_eq!(fs::read(dest).unwrap(), b"12345");
    }

    #[test]
    fn test_copy_onto_itself_through_other_spelling() {
        let temp_dir = TempDir::new().unwrap();
        let photos = temp_dir.path().join("photos");
        fs::create_dir_all(temp_dir.path().join("sub")).unwrap();
        fs::create_dir_all(&photos).unwrap();
        let src = photos.join("a.jpg");
        fs::write(&src, b"keep me").unwrap();

        let dest = temp_dir.path().join("sub/../photos/a.jpg");
        assert!(same_file(&src, &dest));
        assert_eq!(copy_to_output(&src, &dest).unwrap(), 7);
        assert_eq!(fs::read(&src).unwrap(), b"keep me");
    }

    #[test]
    fn test_resolved_path_of_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("sub")).unwrap();
        let spelled = temp_dir.path().join("sub/../new.jpg");
        assert_eq!(
            resolved_path(&spelled),
            fs::canonicalize(temp_dir.path()).unwrap().join("new.jpg")
        );
        assert!(!same_file(&spelled, &temp_dir.path().join("other.jpg")));
        assert_eq!(
            resolved_path(Path::new("/nonexistent/dir/x.jpg")),
            PathBuf::from("/nonexistent/dir/x.jpg")
        );
    }
}

//! Whole-file replacement via write-then-rename

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// `path` with `suffix` appended to its file name (`dns.db` → `dns.db.tmp`)
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Hidden temp file next to `path` (`api.conf` → `.api.conf.tmp`)
///
/// dnsmasq's `conf-dir` skips dot-files, so a half-written temp file is
/// never picked up by a concurrent reload.
pub(crate) fn hidden_temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    if let Some(file_name) = path.file_name() {
        name.push(file_name);
    }
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace the contents of `path` with `contents`
///
/// The data is written and synced to `temp_path` first, then renamed over
/// `path`, so readers see either the old file or the new one. `temp_path`
/// must be on the same filesystem as `path`.
pub(crate) async fn write_atomic(
    path: &Path,
    temp_path: &Path,
    contents: &[u8],
    mode: u32,
) -> io::Result<()> {
    let result = write_and_rename(path, temp_path, contents, mode).await;
    if result.is_err() {
        let _ = fs::remove_file(temp_path).await;
    }
    result
}

async fn write_and_rename(
    path: &Path,
    temp_path: &Path,
    contents: &[u8],
    mode: u32,
) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options.open(temp_path).await?;
    file.write_all(contents).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(temp_path, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_temp_paths() {
        let path = Path::new("/etc/dnsmasq.d/api.conf");
        assert_eq!(
            hidden_temp_path(path),
            PathBuf::from("/etc/dnsmasq.d/.api.conf.tmp")
        );
        assert_eq!(
            with_suffix(Path::new("/var/lib/dns.db"), ".backup"),
            PathBuf::from("/var/lib/dns.db.backup")
        );
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("api.conf");
        let temp = hidden_temp_path(&path);

        fs::write(&path, b"old contents that are longer").await.unwrap();
        write_atomic(&path, &temp, b"new", 0o644).await.unwrap();

        assert_eq!(fs::read(&path).await.unwrap(), b"new");
        assert!(!temp.exists());
    }

    #[tokio::test]
    async fn test_write_atomic_missing_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("api.conf");
        let temp = hidden_temp_path(&path);

        assert!(write_atomic(&path, &temp, b"data", 0o644).await.is_err());
        assert!(!path.exists());
    }
}

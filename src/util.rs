use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::NamedTempFile;

pub fn read_file_bytes(path: &Path) -> io::Result<Vec<u8>> {
    fs::read(path)
}

/// Replaces the contents of `path` atomically: the bytes are written and
/// synced to a temporary file in the same directory, which is then renamed
/// over the target and the directory is synced. Readers see either the old
/// or the new contents, and once this returns the new contents survive a crash.
pub fn write_file_bytes(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp_file = write_tmp_beside(path, bytes)?;
    tmp_file.persist(path).map_err(|e| e.error)?;
    sync_parent(path)
}

/// Like `write_file_bytes`, restricting the file to its owner.
pub fn write_file_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp_file = write_tmp_beside(path, bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp_file.path(), fs::Permissions::from_mode(0o600))?;
    }
    tmp_file.persist(path).map_err(|e| e.error)?;
    sync_parent(path)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

// the rename is only durable once the directory entry is
fn sync_parent(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        fs::File::open(parent_dir(path))?.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

fn write_tmp_beside(path: &Path, bytes: &[u8]) -> io::Result<NamedTempFile> {
    let mut tmp_file = NamedTempFile::new_in(parent_dir(path))?;
    tmp_file.write_all(bytes)?;
    tmp_file.as_file().sync_all()?;
    Ok(tmp_file)
}

/// Seconds since the unix epoch.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

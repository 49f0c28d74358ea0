//! Crash-safe file replacement shared by the calendar and key files.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use almanac_core::constants::TEMP_FILE_SUFFIX;

use crate::error::StoreResult;

/// Returns `<path>~`.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TEMP_FILE_SUFFIX);
    PathBuf::from(name)
}

/// Writes `contents` to `<path>~` and renames it over `path`.
///
/// On any failure the temporary file is removed and `path` is left as it was.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let temp = temp_path(path);
    let result = write_then_rename(&temp, path, contents);
    if result.is_err()
        && let Err(err) = fs::remove_file(&temp)
        && err.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %temp.display(), error = %err, "Failed to discard temporary file");
    }
    result
}

fn write_then_rename(temp: &Path, path: &Path, contents: &[u8]) -> StoreResult<()> {
    let mut file = fs::File::create(temp)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    fs::rename(temp, path)?;
    Ok(())
}

/// Removes a file, treating a missing file as success.
pub(crate) fn remove_if_exists(path: &Path) -> StoreResult<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_appends_suffix() {
        assert_eq!(
            temp_path(Path::new("/tmp/cal/calendar.ics")),
            PathBuf::from("/tmp/cal/calendar.ics~")
        );
    }

    #[test]
    fn write_replaces_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("file.txt");

        write_atomically(&path, b"one").unwrap();
        write_atomically(&path, b"two").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn failed_write_keeps_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.txt");
        write_atomically(&path, b"original").unwrap();

        // A directory squatting on the temp name makes the create fail.
        fs::create_dir(temp_path(&path)).unwrap();
        assert!(write_atomically(&path, b"new").is_err());

        assert_eq!(fs::read(&path).unwrap(), b"original");
    }

    #[test]
    fn remove_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_if_exists(&dir.path().join("absent")).is_ok());
    }
}

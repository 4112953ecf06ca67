//! Filesystem helpers used at session setup and teardown

use std::fs;
use std::io;
use std::path::Path;

/// Move a file, replacing `to` if it exists.
///
/// Falls back to copy + delete across filesystems. The copy lands next to
/// `to` first, so an existing `to` is only ever replaced by a rename.
/// Creates the destination's parent directory when missing.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if !from.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{:?} does not exist", from),
        ));
    }
    if let Some(parent) = to.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!("rename {:?} -> {:?} failed ({}), copying instead", from, to, e);
            let file_name = to
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let staging = to.with_file_name(format!(".{}.part", file_name));
            if let Err(e) = fs::copy(from, &staging).and_then(|_| fs::rename(&staging, to)) {
                let _ = fs::remove_file(&staging);
                return Err(e);
            }
            fs::remove_file(from)
        }
    }
}

/// Delete a file. Returns `Ok(false)` if it did not exist.
pub fn delete_file(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove everything inside `dir`, keeping the directory itself.
pub fn clear_directory(dir: &Path) -> io::Result<()> {
    if !dir.exists() {
        return fs::create_dir_all(dir);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_move_file_creates_parent() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("video-only.scnf");
        let to = dir.path().join("out").join("final.scnf");
        fs::write(&from, b"frames").unwrap();

        move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"frames");
    }

    #[test]
    fn test_move_missing_source_keeps_target() {
        let dir = tempdir().unwrap();
        let to = dir.path().join("final.scnf");
        fs::write(&to, b"recording").unwrap();

        let err = move_file(&dir.path().join("gone.scnf"), &to).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(fs::read(&to).unwrap(), b"recording");
    }

    #[test]
    fn test_move_replaces_existing_target() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("video-only.scnf");
        let to = dir.path().join("final.scnf");
        fs::write(&from, b"new").unwrap();
        fs::write(&to, b"old").unwrap();

        move_file(&from, &to).unwrap();

        assert_eq!(fs::read(&to).unwrap(), b"new");
        assert!(!from.exists());
    }

    #[test]
    fn test_delete_missing_file() {
        let dir = tempdir().unwrap();
        assert!(!delete_file(&dir.path().join("nope")).unwrap());
    }

    #[test]
    fn test_clear_directory() {
        let dir = tempdir().unwrap();
        let work = dir.path().join("work");
        fs::create_dir_all(work.join("nested")).unwrap();
        fs::write(work.join("a.tmp"), b"x").unwrap();
        fs::write(work.join("nested").join("b.tmp"), b"y").unwrap();

        clear_directory(&work).unwrap();

        assert!(work.exists());
        assert_eq!(fs::read_dir(&work).unwrap().count(), 0);
    }
}

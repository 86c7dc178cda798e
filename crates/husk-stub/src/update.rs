//! Atomic update promotion and module copy-in side channels.
//!
//! The update path is written by an external updater while the app runs;
//! promotion happens at the next bootstrap via a single atomic rename, so
//! the current module is always either the old file or the fully-new file.
//! The copy side channels (sideload, canonical-package import) are not
//! atomic; a failed copy removes the partial destination so the bootstrap
//! falls back to "no module" instead of a corrupt one.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::paths::ModulePaths;

/// Errors from the update applier. All are non-fatal to the bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// The staged update could not be renamed onto the current module.
    #[error("failed to promote staged update: {0}")]
    Promote(#[source] io::Error),

    /// Copying a module in from an alternate source failed.
    #[error("failed to copy module from {path}: {source}")]
    Copy {
        /// Source the copy was attempted from.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// Promote a staged update onto the current module path.
///
/// Returns `Ok(true)` if an update was present and promoted, `Ok(false)` if
/// no update was staged. On rename failure the staged file is left intact
/// and the previous current module (if any) remains usable.
pub fn apply_pending_update(paths: &ModulePaths) -> Result<bool, UpdateError> {
    if !paths.update().exists() {
        return Ok(false);
    }

    match fs::rename(paths.update(), paths.current()) {
        Ok(()) => {
            log::debug!("promoted staged update to {}", paths.current().display());
            Ok(true)
        }
        Err(e) => Err(UpdateError::Promote(e)),
    }
}

/// Copy a module from `source` onto the current module path.
///
/// On failure the partially-written destination is removed, leaving the
/// bootstrap with "no module" rather than a corrupt one.
pub fn install_from(source: &Path, paths: &ModulePaths) -> Result<(), UpdateError> {
    if let Err(e) = copy_file(source, paths.current()) {
        let _ = fs::remove_file(paths.current());
        return Err(UpdateError::Copy {
            path: source.to_path_buf(),
            source: e,
        });
    }
    Ok(())
}

/// Consume a sideloaded module from an external location.
///
/// Development aid: copies `source` onto the current module path and
/// deletes the source regardless of outcome, so a bad sideload is not
/// retried forever. Returns `Ok(false)` when no sideload file exists.
pub fn sideload_from(source: &Path, paths: &ModulePaths) -> Result<bool, UpdateError> {
    if !source.exists() {
        return Ok(false);
    }

    let result = install_from(source, paths);
    if let Err(e) = fs::remove_file(source) {
        log::warn!("failed to remove sideload source {}: {}", source.display(), e);
    }
    result.map(|()| true)
}

fn copy_file(source: &Path, dest: &Path) -> io::Result<()> {
    let mut src = fs::File::open(source)?;
    let mut dst = fs::File::create(dest)?;
    io::copy(&mut src, &mut dst)?;
    dst.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::module_paths;
    use husk_sdk::PackageMetadata;
    use tempfile::TempDir;

    fn test_paths(dir: &TempDir) -> ModulePaths {
        let metadata = PackageMetadata::new("app.husk", dir.path(), None, 2);
        let paths = module_paths(&metadata);
        fs::create_dir_all(paths.dir()).unwrap();
        paths
    }

    #[test]
    fn test_apply_without_staged_update() {
        let dir = tempfile::tempdir().unwrap();
        let paths = test_paths(&dir);
        fs::write(paths.current(), b"old").unwrap();

        assert!(!apply_pending_update(&paths).unwrap());
        assert_eq!(fs::read(paths.current()).unwrap(), b"old");
    }

    #[test]
    fn test_apply_promotes_staged_update() {
        let dir = tempfile::tempdir().unwrap();
        let paths = test_paths(&dir);
        fs::write(paths.current(), b"old").unwrap();
        fs::write(paths.update(), b"new").unwrap();

        assert!(apply_pending_update(&paths).unwrap());
        assert_eq!(fs::read(paths.current()).unwrap(), b"new");
        assert!(!paths.update().exists());
    }

    #[test]
    fn test_apply_without_current_module() {
        let dir = tempfile::tempdir().unwrap();
        let paths = test_paths(&dir);
        fs::write(paths.update(), b"new").unwrap();

        assert!(apply_pending_update(&paths).unwrap());
        assert_eq!(fs::read(paths.current()).unwrap(), b"new");
        assert!(!paths.update().exists());
    }

    #[test]
    fn test_failed_promote_leaves_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = test_paths(&dir);
        fs::write(paths.update(), b"new").unwrap();
        // A non-empty directory at the destination makes rename fail.
        fs::create_dir(paths.current()).unwrap();
        fs::write(paths.current().join("occupied"), b"x").unwrap();

        let result = apply_pending_update(&paths);
        assert!(matches!(result, Err(UpdateError::Promote(_))));
        assert_eq!(fs::read(paths.update()).unwrap(), b"new");
    }

    #[test]
    fn test_install_from_copies_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let paths = test_paths(&dir);
        let source = dir.path().join("other.mod");
        fs::write(&source, b"imported").unwrap();

        install_from(&source, &paths).unwrap();
        assert_eq!(fs::read(paths.current()).unwrap(), b"imported");
        assert!(source.exists());
    }

    #[test]
    fn test_sideload_consumes_source_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let paths = test_paths(&dir);
        let source = dir.path().join("husk.mod");
        fs::write(&source, b"sideloaded").unwrap();

        assert!(sideload_from(&source, &paths).unwrap());
        assert_eq!(fs::read(paths.current()).unwrap(), b"sideloaded");
        assert!(!source.exists());
    }

    #[test]
    fn test_sideload_consumes_source_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = PackageMetadata::new("app.husk", dir.path().join("missing"), None, 2);
        let paths = module_paths(&metadata);
        let source = dir.path().join("husk.mod");
        fs::write(&source, b"sideloaded").unwrap();

        // Destination dir does not exist, so the copy fails.
        let result = sideload_from(&source, &paths);
        assert!(matches!(result, Err(UpdateError::Copy { .. })));
        assert!(!source.exists());
        assert!(!paths.current().exists());
    }

    #[test]
    fn test_sideload_without_source() {
        let dir = tempfile::tempdir().unwrap();
        let paths = test_paths(&dir);

        assert!(!sideload_from(&dir.path().join("husk.mod"), &paths).unwrap());
        assert!(!paths.current().exists());
    }
}

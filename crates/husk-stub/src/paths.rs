//! Payload locator: canonical module paths derived from package metadata.
//!
//! Pure path derivation, no filesystem access. The module directory lives
//! under the package's private data dir so the host install mechanism never
//! sees it; the update path is the well-known staging location an external
//! updater writes to.

use std::path::PathBuf;

use husk_sdk::PackageMetadata;

/// Directory under the package data dir holding the payload modules.
pub const MODULE_DIR: &str = "dyn";

/// File name of the active payload module.
pub const CURRENT_MODULE: &str = "current.mod";

/// File name of a staged update, promoted at next bootstrap.
pub const UPDATE_MODULE: &str = "update.mod";

/// Well-known sideload file name under the app-specific external dir.
pub const SIDELOAD_MODULE: &str = "husk.mod";

/// Resolved storage locations for the payload module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePaths {
    dir: PathBuf,
    current: PathBuf,
    update: PathBuf,
}

impl ModulePaths {
    /// Directory backing the module files.
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Path of the active module file.
    pub fn current(&self) -> &PathBuf {
        &self.current
    }

    /// Path of the staged update file.
    pub fn update(&self) -> &PathBuf {
        &self.update
    }
}

/// Derive the module paths for the running package.
pub fn module_paths(metadata: &PackageMetadata) -> ModulePaths {
    let dir = metadata.data_dir().join(MODULE_DIR);
    let current = dir.join(CURRENT_MODULE);
    let update = dir.join(UPDATE_MODULE);
    ModulePaths { dir, current, update }
}

/// Derive the development sideload path, if external storage is available.
pub fn sideload_path(metadata: &PackageMetadata) -> Option<PathBuf> {
    metadata.external_dir().map(|dir| dir.join(SIDELOAD_MODULE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn metadata(external: bool) -> PackageMetadata {
        let external_dir = external.then(|| PathBuf::from("/storage/app.husk/files"));
        PackageMetadata::new("app.husk", "/data/user/0/app.husk", external_dir, 2)
    }

    #[test]
    fn test_module_paths_derivation() {
        let paths = module_paths(&metadata(false));
        assert_eq!(paths.dir(), Path::new("/data/user/0/app.husk/dyn"));
        assert_eq!(paths.current(), Path::new("/data/user/0/app.husk/dyn/current.mod"));
        assert_eq!(paths.update(), Path::new("/data/user/0/app.husk/dyn/update.mod"));
    }

    #[test]
    fn test_paths_are_deterministic() {
        assert_eq!(module_paths(&metadata(false)), module_paths(&metadata(false)));
    }

    #[test]
    fn test_sideload_path() {
        assert_eq!(sideload_path(&metadata(false)), None);
        assert_eq!(
            sideload_path(&metadata(true)),
            Some(PathBuf::from("/storage/app.husk/files/husk.mod"))
        );
    }
}

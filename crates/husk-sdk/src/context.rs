//! Host runtime seam: execution context, package metadata, class loading.
//!
//! The host hands the stub an execution context at process start. The
//! context may be wrapped any number of times ([`ContextWrapper`]); the
//! innermost layer is the privileged [`HostContext`], which carries the
//! package metadata and the replaceable class-loader slot the host resolves
//! component classes through.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::contract::Component;

// ============================================================================
// Class loading
// ============================================================================

/// Code-loading facility the host resolves component classes through.
pub trait ClassLoader: Send + Sync {
    /// Resolve and construct a component class by name.
    ///
    /// Returning `None` means the class is unknown to this loader.
    fn load_class(&self, class_name: &str) -> Option<Box<dyn Component>>;
}

// ============================================================================
// Package metadata
// ============================================================================

/// Host-supplied metadata describing the running package. Read-only.
#[derive(Debug, Clone)]
pub struct PackageMetadata {
    package_name: String,
    data_dir: PathBuf,
    external_dir: Option<PathBuf>,
    runtime_level: u32,
}

impl PackageMetadata {
    /// Create a metadata record.
    ///
    /// # Arguments
    /// * `package_name` - Package identity of the running installation
    /// * `data_dir` - Private storage root for this package
    /// * `external_dir` - App-specific external storage dir, if mounted
    /// * `runtime_level` - Host runtime capability level
    pub fn new(
        package_name: impl Into<String>,
        data_dir: impl Into<PathBuf>,
        external_dir: Option<PathBuf>,
        runtime_level: u32,
    ) -> Self {
        PackageMetadata {
            package_name: package_name.into(),
            data_dir: data_dir.into(),
            external_dir,
            runtime_level,
        }
    }

    /// Package identity of the running installation.
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Private storage root for this package.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// App-specific external storage dir, if mounted.
    pub fn external_dir(&self) -> Option<&Path> {
        self.external_dir.as_deref()
    }

    /// Host runtime capability level.
    pub fn runtime_level(&self) -> u32 {
        self.runtime_level
    }
}

/// Host-side lookup of other installed packages.
pub trait PackageRegistry: Send + Sync {
    /// Path to the installed payload module of `package`, if installed.
    fn module_source(&self, package: &str) -> Option<PathBuf>;
}

// ============================================================================
// Execution context
// ============================================================================

/// Handle representing the running component, possibly wrapped.
pub trait Context: Send + Sync {
    /// The wrapped context, if this is a wrapper layer.
    fn base(&self) -> Option<&dyn Context> {
        None
    }

    /// The privileged host context, if this is the innermost layer.
    fn as_host(&self) -> Option<&HostContext> {
        None
    }
}

/// Walk wrapper layers down to the innermost context.
pub fn innermost(context: &dyn Context) -> &dyn Context {
    let mut current = context;
    while let Some(base) = current.base() {
        current = base;
    }
    current
}

/// A context layer that wraps another context.
pub struct ContextWrapper {
    base: Arc<dyn Context>,
}

impl ContextWrapper {
    /// Wrap an existing context.
    pub fn new(base: Arc<dyn Context>) -> Self {
        ContextWrapper { base }
    }
}

impl Context for ContextWrapper {
    fn base(&self) -> Option<&dyn Context> {
        Some(self.base.as_ref())
    }
}

/// The innermost, privileged execution context.
///
/// Owns the class-loader slot the host resolves component classes through.
/// The slot is replaceable: on host runtimes without factory-based
/// construction, the stub rebases the context by swapping this reference
/// for one that forwards to the loaded payload module.
pub struct HostContext {
    metadata: PackageMetadata,
    packages: Arc<dyn PackageRegistry>,
    class_loader: RwLock<Arc<dyn ClassLoader>>,
}

impl HostContext {
    /// Create a host context with its initial class loader.
    pub fn new(
        metadata: PackageMetadata,
        packages: Arc<dyn PackageRegistry>,
        class_loader: Arc<dyn ClassLoader>,
    ) -> Self {
        HostContext {
            metadata,
            packages,
            class_loader: RwLock::new(class_loader),
        }
    }

    /// Metadata of the running package.
    pub fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }

    /// Installed-package lookup.
    pub fn packages(&self) -> &dyn PackageRegistry {
        self.packages.as_ref()
    }

    /// The class loader the host currently resolves classes through.
    pub fn class_loader(&self) -> Arc<dyn ClassLoader> {
        self.class_loader.read().clone()
    }

    /// Replace the class-loader reference.
    ///
    /// Privileged capability: only the stub's context-rebasing step may call
    /// this, and only before the host has started resolving classes.
    pub fn replace_class_loader(&self, loader: Arc<dyn ClassLoader>) {
        *self.class_loader.write() = loader;
    }
}

impl Context for HostContext {
    fn as_host(&self) -> Option<&HostContext> {
        Some(self)
    }
}

//! Module loading facility: the write-once Inactive→Active loader slot.
//!
//! One slot exists per process. It starts Inactive (every request fails
//! with [`LoadError::Unavailable`]) and becomes Active at most once, bound
//! to a single validated module file for the remaining process lifetime.
//! Picking up a newer module requires a process restart; in-process code
//! replacement is deliberately unsupported.
//!
//! Resolution and instantiation go through a narrow capability seam
//! ([`LoaderBackend`]) so the mechanics of getting code out of a module
//! file (dynamic linker, in-process registry, whatever the platform
//! offers) stay out of the orchestration logic.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use husk_sdk::{
    AppEntry, ClassLoader, Component, ComponentFactory, PayloadData, PayloadError,
    PayloadRegistry,
};

use crate::format::{FormatError, ModuleFile, ModuleManifest};

/// Errors from the loading facility and its backends.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// No payload module is active in this process.
    #[error("no payload module is active")]
    Unavailable,

    /// The module container failed validation.
    #[error("{0}")]
    Format(#[from] FormatError),

    /// The facility is already bound to a module file.
    #[error("a payload module is already active from {0}")]
    AlreadyActive(PathBuf),

    /// The named type does not exist in the loaded module.
    #[error("type not found in payload module: {0}")]
    TypeNotFound(String),

    /// A resolved constructor reported failure.
    #[error("constructor for {class} failed: {source}")]
    Constructor {
        /// Class whose constructor failed.
        class: String,
        /// Failure reported by the payload.
        #[source]
        source: PayloadError,
    },

    /// Platform dynamic-linker failure.
    #[error("library error: {0}")]
    Library(String),

    /// The payload init symbol returned no registry.
    #[error("payload init symbol returned null")]
    NullRegistry,

    /// I/O error while preparing the module for loading.
    #[error("{0}")]
    Io(#[from] io::Error),
}

/// Capability that turns a validated module file into a type registry.
pub trait LoaderBackend: Send + Sync {
    /// Load the module's code image and return its registry.
    fn load(&self, module: &ModuleFile) -> Result<PayloadRegistry, LoadError>;
}

/// An activated facility, bound to one module file.
pub struct ActiveLoader {
    module: ModuleFile,
    registry: PayloadRegistry,
}

impl ActiveLoader {
    /// Manifest of the bound module.
    pub fn manifest(&self) -> &ModuleManifest {
        self.module.manifest()
    }

    /// Path of the bound module file.
    pub fn path(&self) -> &Path {
        self.module.path()
    }

    /// Resolve and construct the entry object `class`, passing it `data`.
    pub fn instantiate_entry(
        &self,
        class: &str,
        data: Arc<PayloadData>,
    ) -> Result<Box<dyn AppEntry>, LoadError> {
        let ctor = self
            .registry
            .entry(class)
            .ok_or_else(|| LoadError::TypeNotFound(class.to_string()))?;
        ctor(data).map_err(|source| LoadError::Constructor {
            class: class.to_string(),
            source,
        })
    }

    /// Resolve and construct the component factory `class`.
    pub fn instantiate_factory(
        &self,
        class: &str,
    ) -> Result<Box<dyn ComponentFactory>, LoadError> {
        let ctor = self
            .registry
            .factory(class)
            .ok_or_else(|| LoadError::TypeNotFound(class.to_string()))?;
        ctor().map_err(|source| LoadError::Constructor {
            class: class.to_string(),
            source,
        })
    }

    /// Resolve and construct a plain component class.
    pub fn load_class(&self, class: &str) -> Option<Box<dyn Component>> {
        self.registry.component(class).map(|ctor| ctor())
    }
}

/// Write-once slot holding the process's loading facility state.
///
/// Empty = Inactive, filled = Active. The single writer is the bootstrap
/// sequence, which runs before any reader exists; the cell makes the
/// once-only transition checked rather than assumed.
#[derive(Default)]
pub struct LoaderSlot {
    active: OnceCell<ActiveLoader>,
}

impl LoaderSlot {
    /// Create an Inactive slot.
    pub fn new() -> Self {
        LoaderSlot {
            active: OnceCell::new(),
        }
    }

    /// Bind the facility to `module`, loading its registry via `backend`.
    ///
    /// The Inactive→Active transition happens at most once per slot; a
    /// second activation is rejected with [`LoadError::AlreadyActive`]
    /// whether or not it names the same file.
    pub fn activate(
        &self,
        module: ModuleFile,
        backend: &dyn LoaderBackend,
    ) -> Result<(), LoadError> {
        if let Some(active) = self.active.get() {
            return Err(LoadError::AlreadyActive(active.path().to_path_buf()));
        }

        let registry = backend.load(&module)?;
        log::debug!(
            "payload module '{}' activated from {}",
            registry.name(),
            module.path().display()
        );
        self.active
            .set(ActiveLoader { module, registry })
            .map_err(|lost| LoadError::AlreadyActive(lost.module.path().to_path_buf()))
    }

    /// Whether a module has been activated in this process.
    pub fn is_active(&self) -> bool {
        self.active.get().is_some()
    }

    /// The active loader, if any.
    pub fn active(&self) -> Option<&ActiveLoader> {
        self.active.get()
    }

    /// Resolve and construct the entry object through the active loader.
    pub fn instantiate_entry(
        &self,
        class: &str,
        data: Arc<PayloadData>,
    ) -> Result<Box<dyn AppEntry>, LoadError> {
        self.active()
            .ok_or(LoadError::Unavailable)?
            .instantiate_entry(class, data)
    }

    /// Resolve and construct the component factory through the active loader.
    pub fn instantiate_factory(&self, class: &str) -> Result<Box<dyn ComponentFactory>, LoadError> {
        self.active()
            .ok_or(LoadError::Unavailable)?
            .instantiate_factory(class)
    }
}

/// Class loader that forwards every load to the facility slot.
///
/// Installed into the host context by the rebasing step; while the slot is
/// Inactive every load resolves to nothing, matching the "module absent"
/// contract.
pub struct ForwardingLoader {
    slot: Arc<LoaderSlot>,
}

impl ForwardingLoader {
    /// Create a loader forwarding to `slot`.
    pub fn new(slot: Arc<LoaderSlot>) -> Self {
        ForwardingLoader { slot }
    }
}

impl ClassLoader for ForwardingLoader {
    fn load_class(&self, class_name: &str) -> Option<Box<dyn Component>> {
        self.slot.active().and_then(|active| active.load_class(class_name))
    }
}

//! Bootstrap entry point: produce an entry object for the host, or a clean
//! nothing.
//!
//! Runs synchronously during host process initialization, before any other
//! component starts. The sequence either hands the host a fully
//! constructed entry object from the payload module, or logs why it could
//! not and hands back `None`; no failure escapes this module.

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use husk_sdk::{innermost, AppEntry, Context, HostContext, PackageMetadata, PayloadData};

use crate::delegate::DelegateComponentFactory;
use crate::error::BootstrapError;
use crate::format::{ModuleFile, ModuleManifest};
use crate::loader::{ActiveLoader, LoadError, LoaderBackend, LoaderSlot};
use crate::paths::{self, ModulePaths};
use crate::rebase;
use crate::update;

/// Host runtime level at which component construction is routed through an
/// installable factory. Older levels resolve classes directly through the
/// context's loader reference and need context rebasing instead.
pub const FACTORY_CAPABLE_LEVEL: u32 = 2;

/// Whether `level` routes component construction through the factory
/// delegate. Evaluated once per bootstrap; delegation and rebasing are
/// mutually exclusive within a process.
pub fn supports_factory_delegation(level: u32) -> bool {
    level >= FACTORY_CAPABLE_LEVEL
}

/// The stub's bootstrap state and entry point.
///
/// One instance per process, created before the host runs anything else.
/// Owns the loading facility slot and the payload record; holds the
/// component factory delegate when the host installed one.
pub struct Bootstrap {
    canonical_package: String,
    data: Arc<PayloadData>,
    slot: Arc<LoaderSlot>,
    delegate: Option<Arc<DelegateComponentFactory>>,
    backend: Box<dyn LoaderBackend>,
    dev_sideload: bool,
    load_attempted: AtomicBool,
}

impl Bootstrap {
    /// Create the bootstrap state.
    ///
    /// # Arguments
    /// * `canonical_package` - Package identity the payload is canonically
    ///   installed under; a secondary installation copies its module from
    ///   there when it has none of its own
    /// * `data` - The payload record handed to the entry object
    /// * `backend` - Loader backend that turns a module file into a registry
    pub fn new(
        canonical_package: impl Into<String>,
        data: PayloadData,
        backend: Box<dyn LoaderBackend>,
    ) -> Self {
        Bootstrap {
            canonical_package: canonical_package.into(),
            data: Arc::new(data),
            slot: Arc::new(LoaderSlot::new()),
            delegate: None,
            backend,
            dev_sideload: false,
            load_attempted: AtomicBool::new(false),
        }
    }

    /// Attach the component factory delegate the host installed.
    pub fn with_delegate(mut self, delegate: Arc<DelegateComponentFactory>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Enable the external sideload channel (development builds only).
    pub fn with_dev_sideload(mut self, enabled: bool) -> Self {
        self.dev_sideload = enabled;
        self
    }

    /// The process-wide loading facility slot.
    pub fn loader_slot(&self) -> &Arc<LoaderSlot> {
        &self.slot
    }

    /// Run the full bootstrap sequence against the host context.
    ///
    /// Returns the instantiated entry object, attached to the context, or
    /// `None` when no usable payload module could be produced. `None` is
    /// the documented null the host receives; nothing is half-initialized.
    pub fn create_and_setup_app(&self, context: Arc<dyn Context>) -> Option<Arc<dyn AppEntry>> {
        let Some(host) = innermost(context.as_ref()).as_host() else {
            log::error!("execution context has no reachable host context, cannot bootstrap");
            return None;
        };
        let level = host.metadata().runtime_level();

        // Below the factory-capable level the host resolves component
        // classes straight off the context's loader reference, starting
        // with its own; the swap must come before everything else.
        if !supports_factory_delegation(level) {
            if let Err(e) = rebase::replace_class_loader(context.as_ref(), self.slot.clone()) {
                // No recovery: the host already resolves through the old
                // reference.
                log::error!("{}", BootstrapError::from(e));
            }
        }

        let entry = match self.create_app(host, level) {
            Ok(entry) => entry,
            Err(e) => {
                // Visible limitation: the host receives no application
                // instance for this process.
                log::error!("{}, handing the host a null application", e);
                return None;
            }
        };
        let entry: Arc<dyn AppEntry> = Arc::from(entry);
        // The entry object becomes the true backing object of the context.
        entry.attach(context.clone());
        Some(entry)
    }

    /// Resolve a module and instantiate the payload from it.
    fn create_app(
        &self,
        host: &HostContext,
        level: u32,
    ) -> Result<Box<dyn AppEntry>, BootstrapError> {
        let metadata = host.metadata();
        let module_paths = paths::module_paths(metadata);

        if let Err(e) = fs::create_dir_all(module_paths.dir()) {
            log::warn!("{}", BootstrapError::from(e));
        }

        self.activate_module(metadata, &module_paths);

        // Still no module: a secondary installation may bootstrap off the
        // canonical one.
        if !self.slot.is_active() && metadata.package_name() != self.canonical_package {
            self.import_canonical(host, &module_paths);
        }

        let active = self.slot.active().ok_or(BootstrapError::ModuleUnavailable)?;

        let manifest = active.manifest().clone();
        match self.instantiate_payload(active, &manifest, level) {
            Ok(entry) => Ok(entry),
            Err(e) => {
                // A module that cannot produce its entry object is useless;
                // treat it as absent.
                log::error!(
                    "deleting unusable payload module {}",
                    module_paths.current().display()
                );
                let _ = fs::remove_file(module_paths.current());
                Err(e.into())
            }
        }
    }

    /// Instantiate the entry object, and the factory target when declared
    /// and the level supports delegation.
    fn instantiate_payload(
        &self,
        active: &ActiveLoader,
        manifest: &ModuleManifest,
        level: u32,
    ) -> Result<Box<dyn AppEntry>, LoadError> {
        let entry = active.instantiate_entry(&manifest.entry_class, self.data.clone())?;

        if let Some(factory_class) = &manifest.factory_class {
            if supports_factory_delegation(level) {
                match &self.delegate {
                    Some(delegate) => {
                        let factory = active.instantiate_factory(factory_class)?;
                        delegate.set_target(factory);
                    }
                    None => log::warn!(
                        "module declares factory {} but the host installed no delegate",
                        factory_class
                    ),
                }
            }
        }

        Ok(entry)
    }

    /// Steps 1-4: promote updates, consume sideloads, bind the facility.
    /// Runs at most once per process.
    fn activate_module(&self, metadata: &PackageMetadata, module_paths: &ModulePaths) {
        if self.load_attempted.swap(true, Ordering::SeqCst) {
            return;
        }

        // Non-fatal: on failure the staged file stays put and the previous
        // module (or its absence) persists.
        if let Err(e) = update::apply_pending_update(module_paths) {
            log::warn!("{}", BootstrapError::from(e));
        }

        if self.dev_sideload {
            if let Some(source) = paths::sideload_path(metadata) {
                if let Err(e) = update::sideload_from(&source, module_paths) {
                    log::warn!("{}", BootstrapError::from(e));
                }
            }
        }

        if module_paths.current().exists() {
            self.try_activate(module_paths);
        }
    }

    /// Copy the canonical installation's module and activate it.
    fn import_canonical(&self, host: &HostContext, module_paths: &ModulePaths) {
        let Some(source) = host.packages().module_source(&self.canonical_package) else {
            // Canonical package not installed; nothing to bootstrap from.
            return;
        };
        match update::install_from(&source, module_paths) {
            Ok(()) => self.try_activate(module_paths),
            Err(e) => log::warn!("{}", BootstrapError::from(e)),
        }
    }

    /// Validate and activate the current module file. A file that fails any
    /// step is deleted: a corrupt module is treated as absent, never as
    /// partially usable.
    fn try_activate(&self, module_paths: &ModulePaths) {
        let module = match ModuleFile::open(module_paths.current()) {
            Ok(module) => module,
            Err(e) => {
                log::error!(
                    "{}, deleting {}",
                    BootstrapError::ModuleLoad(e.into()),
                    module_paths.current().display()
                );
                let _ = fs::remove_file(module_paths.current());
                return;
            }
        };

        if let Err(e) = self.slot.activate(module, self.backend.as_ref()) {
            log::error!(
                "{}, deleting {}",
                BootstrapError::ModuleLoad(e),
                module_paths.current().display()
            );
            let _ = fs::remove_file(module_paths.current());
        }
    }
}

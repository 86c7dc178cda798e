//! Husk stub - dynamic payload bootstrap
//!
//! The stub is the tiny installed half of a two-part application: a
//! rarely-changing shim whose only job is to bring the real, independently
//! updatable payload module into the process and hand control to it. The
//! host install mechanism never has to touch the payload; the stub promotes
//! staged updates, loads the current module, and rebases the host execution
//! context onto the code it loaded.
//!
//! Bootstrap flow:
//! - **`paths`**: derive the current/update module locations from host
//!   package metadata
//! - **`update`**: promote a staged update by atomic rename; sideload or
//!   copy a module in from an alternate source
//! - **`format`**: parse and validate the on-disk module container
//! - **`loader`**: the write-once Inactive→Active loading facility, bound
//!   to one validated module file per process
//! - **`dylib`**: the production loader backend (platform dynamic linker)
//! - **`delegate`**: forwarding component factory installed into the host's
//!   construction path
//! - **`rebase`**: swap the host context's class loader on runtimes without
//!   factory-based construction
//! - **`bootstrap`**: the entry point orchestrating all of the above

#![warn(missing_docs)]

pub mod bootstrap;
pub mod delegate;
pub mod dylib;
pub mod error;
pub mod format;
pub mod loader;
pub mod paths;
pub mod rebase;
pub mod update;

pub use bootstrap::{supports_factory_delegation, Bootstrap, FACTORY_CAPABLE_LEVEL};
pub use delegate::DelegateComponentFactory;
pub use dylib::DylibBackend;
pub use error::BootstrapError;
pub use format::{FormatError, ModuleFile, ModuleImage, ModuleManifest};
pub use loader::{ForwardingLoader, LoadError, LoaderBackend, LoaderSlot};
pub use paths::{module_paths, sideload_path, ModulePaths};
pub use rebase::RebaseError;
pub use update::UpdateError;

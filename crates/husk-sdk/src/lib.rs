//! Husk SDK - Contract between the stub and its payload modules
//!
//! The husk stub is a tiny, rarely-reinstalled shim that loads the real
//! application code from a separately shipped payload module at process
//! start. This crate defines everything the two sides must agree on so a
//! payload can be compiled against the contract alone, without depending on
//! the stub:
//!
//! - **Payload contract** (`contract` module): the `AppEntry`,
//!   `ComponentFactory`, and `Component` traits, their constructor
//!   signatures, and the `PayloadRegistry` a loaded module hands back
//!   through its init symbol.
//! - **Bootstrap payload record** (`data` module): the immutable
//!   `PayloadData` passed to the entry object so the payload can identify
//!   the stub it is running inside.
//! - **Host seam** (`context` module): the execution context wrapper chain,
//!   the privileged class-loader slot, and the host-supplied package
//!   metadata.
//!
//! # Example
//!
//! ```ignore
//! use husk_sdk::{AppEntry, Context, PayloadData, PayloadError, PayloadRegistry};
//! use std::sync::Arc;
//!
//! struct MainApp;
//!
//! impl AppEntry for MainApp {
//!     fn attach(&self, _context: Arc<dyn Context>) {}
//! }
//!
//! fn new_main_app(_data: Arc<PayloadData>) -> Result<Box<dyn AppEntry>, PayloadError> {
//!     Ok(Box::new(MainApp))
//! }
//!
//! #[no_mangle]
//! pub extern "C" fn husk_payload_init() -> *mut PayloadRegistry {
//!     let mut registry = PayloadRegistry::new("husk-app", "1.0.0");
//!     registry.register_entry("app::MainApp", new_main_app);
//!     Box::into_raw(Box::new(registry))
//! }
//! ```

#![warn(missing_docs)]

mod context;
mod contract;
mod data;

pub use context::{
    innermost, ClassLoader, Context, ContextWrapper, HostContext, PackageMetadata,
    PackageRegistry,
};
pub use contract::{
    AppEntry, Component, ComponentCtor, ComponentFactory, EntryCtor, FactoryCtor, PayloadError,
    PayloadInitFn, PayloadRegistry, PAYLOAD_INIT_SYMBOL,
};
pub use data::PayloadData;

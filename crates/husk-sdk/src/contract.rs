//! Traits and constructor signatures a payload module must implement.
//!
//! A payload module exports a single init symbol ([`PAYLOAD_INIT_SYMBOL`])
//! that returns a [`PayloadRegistry`]: a table of named constructors the
//! stub resolves types from. The registry crosses the dynamic-linker
//! boundary as a raw pointer, so stub and payload must be built against the
//! same SDK version.

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::Context;
use crate::data::PayloadData;

/// Name of the init symbol every payload module exports.
pub const PAYLOAD_INIT_SYMBOL: &str = "husk_payload_init";

/// Signature of the payload init symbol.
///
/// Returns a heap-allocated registry; ownership transfers to the stub.
/// A null return is treated as a load failure.
pub type PayloadInitFn = extern "C" fn() -> *mut PayloadRegistry;

// ============================================================================
// Payload-side traits
// ============================================================================

/// A component the host runtime can construct by class name.
pub trait Component: Send + Sync {
    /// Class name this component was registered under.
    fn class_name(&self) -> &str;
}

/// The real application entry object, instantiated from the payload.
///
/// Constructed with the stub's [`PayloadData`] so the payload can check the
/// contract version and resolve stub-side placeholder classes.
pub trait AppEntry: Send + Sync {
    /// Attach the host execution context to this entry object.
    ///
    /// Called once by the stub after construction; from this point the host
    /// treats calls against the context as calls against this object.
    fn attach(&self, context: Arc<dyn Context>);
}

/// Factory for host components, supplied by the payload.
///
/// Installed behind the stub's forwarding delegate on host runtimes that
/// route component construction through a factory.
pub trait ComponentFactory: Send + Sync {
    /// Construct the component registered under `class_name`.
    ///
    /// Returning `None` falls through to the host's default construction
    /// path.
    fn instantiate(&self, class_name: &str) -> Option<Box<dyn Component>>;
}

// ============================================================================
// Constructor signatures
// ============================================================================

/// Entry object constructor: one argument, the bootstrap payload record.
pub type EntryCtor = fn(Arc<PayloadData>) -> Result<Box<dyn AppEntry>, PayloadError>;

/// Component factory constructor: zero arguments.
pub type FactoryCtor = fn() -> Result<Box<dyn ComponentFactory>, PayloadError>;

/// Plain component constructor: zero arguments, infallible.
pub type ComponentCtor = fn() -> Box<dyn Component>;

/// Errors a payload constructor may report back to the stub.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PayloadError {
    /// The stub's schema version is not one this payload supports.
    #[error("unsupported stub schema version {got} (payload requires {required})")]
    SchemaMismatch {
        /// Schema version the payload was built for.
        required: u32,
        /// Schema version the stub reported.
        got: u32,
    },

    /// Constructor-level failure.
    #[error("payload construction failed: {0}")]
    Init(String),
}

// ============================================================================
// Payload registry
// ============================================================================

/// Named constructor tables a loaded payload module exposes to the stub.
///
/// The stub resolves the manifest-declared entry and factory types here,
/// and the forwarding class loader resolves plain components for the host.
#[derive(Default)]
pub struct PayloadRegistry {
    name: String,
    version: String,
    entries: HashMap<String, EntryCtor>,
    factories: HashMap<String, FactoryCtor>,
    components: HashMap<String, ComponentCtor>,
}

impl PayloadRegistry {
    /// Create an empty registry.
    ///
    /// # Arguments
    /// * `name` - Payload module name
    /// * `version` - Payload version string (informational)
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        PayloadRegistry {
            name: name.into(),
            version: version.into(),
            entries: HashMap::new(),
            factories: HashMap::new(),
            components: HashMap::new(),
        }
    }

    /// Register an entry object constructor under `class_name`.
    pub fn register_entry(&mut self, class_name: impl Into<String>, ctor: EntryCtor) {
        self.entries.insert(class_name.into(), ctor);
    }

    /// Register a component factory constructor under `class_name`.
    pub fn register_factory(&mut self, class_name: impl Into<String>, ctor: FactoryCtor) {
        self.factories.insert(class_name.into(), ctor);
    }

    /// Register a plain component constructor under `class_name`.
    pub fn register_component(&mut self, class_name: impl Into<String>, ctor: ComponentCtor) {
        self.components.insert(class_name.into(), ctor);
    }

    /// Payload module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Look up an entry constructor.
    pub fn entry(&self, class_name: &str) -> Option<EntryCtor> {
        self.entries.get(class_name).copied()
    }

    /// Look up a factory constructor.
    pub fn factory(&self, class_name: &str) -> Option<FactoryCtor> {
        self.factories.get(class_name).copied()
    }

    /// Look up a component constructor.
    pub fn component(&self, class_name: &str) -> Option<ComponentCtor> {
        self.components.get(class_name).copied()
    }
}

impl std::fmt::Debug for PayloadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadRegistry")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("entries", &self.entries.keys())
            .field("factories", &self.factories.keys())
            .field("components", &self.components.keys())
            .finish()
    }
}

//! Bootstrap payload record passed to the loaded entry object.

use std::collections::HashMap;

/// Immutable bundle of stub metadata handed to the payload at construction.
///
/// Built exactly once at process start and shared as `Arc<PayloadData>`.
/// The schema version tells the payload which stub it is talking to; the
/// payload is responsible for rejecting versions it cannot work with (the
/// stub only passes the number through). The component map and root service
/// let the payload resolve the stub-side placeholder classes that the host
/// runtime still routes through.
#[derive(Debug, Clone)]
pub struct PayloadData {
    schema_version: u32,
    component_map: HashMap<String, String>,
    root_service: String,
}

impl PayloadData {
    /// Create a new record.
    ///
    /// # Arguments
    /// * `schema_version` - Stub/payload contract version
    /// * `component_map` - Payload class name → stub component class name
    /// * `root_service` - Stub class name of the privileged service delegate
    pub fn new(
        schema_version: u32,
        component_map: HashMap<String, String>,
        root_service: impl Into<String>,
    ) -> Self {
        PayloadData {
            schema_version,
            component_map,
            root_service: root_service.into(),
        }
    }

    /// Contract version of the stub that created this record.
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Full payload-class → stub-component mapping.
    pub fn component_map(&self) -> &HashMap<String, String> {
        &self.component_map
    }

    /// Stub component registered for a payload class, if any.
    pub fn component_for(&self, class_name: &str) -> Option<&str> {
        self.component_map.get(class_name).map(|s| s.as_str())
    }

    /// Stub class name of the privileged service delegate.
    pub fn root_service(&self) -> &str {
        &self.root_service
    }
}

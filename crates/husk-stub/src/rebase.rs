//! Context rebasing for hosts without factory-based construction.
//!
//! Below the factory-capable runtime level the host resolves every
//! component class through the class-loader reference reachable from the
//! execution context. Rebasing swaps that reference for a
//! [`ForwardingLoader`] bound to the facility slot, and must happen before
//! anything else in the bootstrap: the host starts resolving classes
//! through the old reference as soon as it is allowed to run.
//!
//! The privileged slot mutation lives behind this one function; nothing
//! else touches `HostContext::replace_class_loader`.

use std::sync::Arc;

use husk_sdk::{innermost, Context};

use crate::loader::{ForwardingLoader, LoaderSlot};

/// Errors from the rebasing step. Fatal: the host has already begun using
/// the old loader reference, so there is no recovery path.
#[derive(Debug, thiserror::Error)]
pub enum RebaseError {
    /// The wrapper chain does not reach a privileged host context.
    ///
    /// Should be unreachable: the capability-level gate only routes here on
    /// hosts whose contexts expose the slot.
    #[error("execution context has no reachable host context")]
    NoHostContext,
}

/// Swap the context's class loader for one forwarding to `slot`.
pub fn replace_class_loader(
    context: &dyn Context,
    slot: Arc<LoaderSlot>,
) -> Result<(), RebaseError> {
    let host = innermost(context)
        .as_host()
        .ok_or(RebaseError::NoHostContext)?;
    host.replace_class_loader(Arc::new(ForwardingLoader::new(slot)));
    Ok(())
}

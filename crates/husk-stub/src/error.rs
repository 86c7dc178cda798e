//! Bootstrap error taxonomy.

use crate::loader::LoadError;
use crate::rebase::RebaseError;
use crate::update::UpdateError;

/// Errors that can occur during a bootstrap attempt.
///
/// None of these cross the bootstrap boundary: the entry point logs them
/// and hands the host either a working entry object or a clean `None`.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// No usable payload module could be produced for this process.
    #[error("no usable payload module is available")]
    ModuleUnavailable,

    /// A module file was present but could not be loaded.
    #[error("module load failed: {0}")]
    ModuleLoad(#[from] LoadError),

    /// A staged update or copy could not be applied.
    #[error("update apply failed: {0}")]
    UpdateApply(#[from] UpdateError),

    /// The host context could not be rebased onto the loading facility.
    #[error("context rebase failed: {0}")]
    Rebase(#[from] RebaseError),

    /// File I/O error outside the cases above.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

use thiserror::Error;

use crate::owner::OwnerKey;

/// Errors reported by the scheduler.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no execution context for owner '{0}'")]
    UnknownOwner(OwnerKey),

    #[error("owner '{owner}' made more than {limit} transitions in one step")]
    RunawayLoop { owner: OwnerKey, limit: usize },

    #[error("execution for owner '{0}' was cancelled")]
    Cancelled(OwnerKey),
}

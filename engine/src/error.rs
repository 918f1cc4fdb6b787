//! Error types for the outbox engine.

use crate::{ConflictId, OperationId, OperationStatus};
use thiserror::Error;

/// Errors surfaced to the immediate caller of an engine operation.
///
/// Remote failures are not part of this type: they are recorded on the
/// affected operation and reported through stats.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("operation not found: {0}")]
    OperationNotFound(OperationId),

    #[error("conflict not found: {0}")]
    ConflictNotFound(ConflictId),

    #[error("sync already in progress")]
    SyncInProgress,

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("operation {id} cannot be requeued from status {status:?}")]
    NotRequeueable {
        id: OperationId,
        status: OperationStatus,
    },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

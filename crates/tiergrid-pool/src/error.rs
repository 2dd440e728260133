//! Worker pool error types.

use thiserror::Error;

use tiergrid_core::{NodeId, Request};

/// A request could not be handed to a worker node.
///
/// The rejected request travels back inside the error so the caller can
/// requeue it.
#[derive(Debug, Error)]
pub enum AssignError {
    #[error("worker node {node} is busy")]
    NodeBusy { node: NodeId, request: Request },
}

impl AssignError {
    /// Recover the request that was not assigned.
    pub fn into_request(self) -> Request {
        match self {
            AssignError::NodeBusy { request, .. } => request,
        }
    }
}

pub type PoolResult<T> = Result<T, AssignError>;

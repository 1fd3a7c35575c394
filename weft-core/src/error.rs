//! Engine error types.

use thiserror::Error;

use crate::reactive::ComputationId;

/// Errors surfaced by the reactive engine.
///
/// Most of the engine's surface is infallible; errors arise only from
/// computations that are asked to run when they must not.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A computation read its own output while its frame was still on the
    /// tracking stack.
    #[error("dependency cycle in computation {0}")]
    Cycle(ComputationId),

    /// The computation was disposed and can no longer run.
    #[error("computation {0} is disposed")]
    Disposed(ComputationId),
}

//! Frame graph error types.
//!
//! Misuse of the graph API is a bug in the calling code and panics on the
//! spot. Only failures that come from the device surface as values.

use thiserror::Error;

use crate::backend::BackendError;

/// Errors that abort the execution of a frame graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameGraphError {
    /// The device could not create a transient resource.
    #[error("failed to materialize `{resource}` for pass `{pass}`: {source}")]
    Materialize {
        resource: String,
        pass: String,
        #[source]
        source: BackendError,
    },
    /// Any other device failure.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type FrameGraphResult<T> = Result<T, FrameGraphError>;

use thiserror::Error;

/// Error taxonomy for the retrieval and generation pipeline.
///
/// `InvalidArgument` and `NotInitialized` are fatal to the call that raised
/// them. `BackendUnavailable` is recovered locally where possible: search
/// degrades to empty results, generation emits a single inline error
/// fragment. `NotFound` covers partial data and is usually a warning.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("store is not initialized")]
    NotInitialized,

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("a generation is already in flight")]
    Busy,
}

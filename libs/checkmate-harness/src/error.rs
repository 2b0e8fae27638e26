use checkmate_common::types::ValidationError;

/// Failures visible to the caller; everything submitted code does becomes a `TestResult`
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error("failed to start sandbox process: {0}")]
    Worker(#[source] std::io::Error),
}

//! Type conversions for ResilienceError

use super::types::ResilienceError;

// Foreign errors surface as plain operation failures
impl From<anyhow::Error> for ResilienceError {
    fn from(err: anyhow::Error) -> Self {
        ResilienceError::Operation {
            name: "Error".to_string(),
            message: format!("{:#}", err),
        }
    }
}

impl From<tokio::time::error::Elapsed> for ResilienceError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ResilienceError::Timeout(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ResilienceError {
    fn from(err: tokio::task::JoinError) -> Self {
        ResilienceError::Internal(format!("Task join failed: {}", err))
    }
}

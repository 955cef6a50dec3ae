use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure to enumerate containers.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("container runtime unavailable: {0}")]
    Unavailable(#[from] bollard::errors::Error),
    #[error("container runtime did not answer within {0:?}")]
    Timeout(Duration),
}

/// Failure to deliver a diff to the registry.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request to registry failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("registry responded with {0}")]
    Status(StatusCode),
}

use async_trait::async_trait;

use crate::error::SourceError;
use crate::types::WorkloadRecord;

pub mod docker;
pub use docker::DockerSource;

/// Label filter selecting containers that opted in to discovery.
pub const DISCOVERY_LABEL_FILTER: &str = "discovery.enable=true";

#[async_trait]
pub trait ContainerSource: Send + Sync {
    /// List running containers matching `label_filter` (`key=value`).
    /// Implementations must return within a bounded time.
    async fn list(&self, label_filter: &str) -> Result<Vec<WorkloadRecord>, SourceError>;
}

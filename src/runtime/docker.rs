use super::ContainerSource;
use crate::error::SourceError;
use crate::types::WorkloadRecord;
use async_trait::async_trait;
use bollard::container::ListContainersOptions;
use bollard::models::ContainerSummary;
use bollard::Docker;
use log::{debug, info};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;

/// Upper bound for a single Docker API call.
const LIST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DockerSource {
    docker: Docker,
}

impl DockerSource {
    /// Connects to the local Docker daemon and checks it answers.
    ///
    /// Uses the unix socket on Linux, or `DOCKER_HOST` when set.
    pub async fn connect() -> Result<Self, SourceError> {
        let docker = Docker::connect_with_local_defaults()?;

        let pong = timeout(LIST_TIMEOUT, docker.ping())
            .await
            .map_err(|_| SourceError::Timeout(LIST_TIMEOUT))??;
        info!("Connected to Docker daemon ({})", pong);

        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerSource for DockerSource {
    async fn list(&self, label_filter: &str) -> Result<Vec<WorkloadRecord>, SourceError> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![label_filter.to_string()]);

        let opts = ListContainersOptions::<String> {
            all: false,
            filters,
            ..Default::default()
        };

        let containers = timeout(LIST_TIMEOUT, self.docker.list_containers(Some(opts)))
            .await
            .map_err(|_| SourceError::Timeout(LIST_TIMEOUT))??;
        debug!("Docker returned {} containers for {}", containers.len(), label_filter);

        Ok(containers.into_iter().filter_map(into_workload).collect())
    }
}

/// Containers without an id cannot be tracked and are dropped.
fn into_workload(summary: ContainerSummary) -> Option<WorkloadRecord> {
    let id = summary.id?;
    let names = summary
        .names
        .unwrap_or_default()
        .into_iter()
        .map(|n| n.trim_start_matches('/').to_string())
        .collect();
    let labels = summary.labels.unwrap_or_default().into_iter().collect();

    Some(WorkloadRecord { id, names, labels })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_workload_strips_name_slash() {
        let summary = ContainerSummary {
            id: Some("abc123".into()),
            names: Some(vec!["/web".into(), "/web-alias".into()]),
            labels: Some(HashMap::from([
                ("discovery.enable".to_string(), "true".to_string()),
                (
                    "traefik.http.routers.web.rule".to_string(),
                    "Host(`a.com`)".to_string(),
                ),
            ])),
            ..Default::default()
        };

        let workload = into_workload(summary).unwrap();
        assert_eq!(workload.id, "abc123");
        assert_eq!(workload.names, vec!["web", "web-alias"]);
        assert_eq!(workload.name(), "web");
        assert_eq!(workload.labels.len(), 2);
        assert_eq!(
            workload.labels.get("traefik.http.routers.web.rule").map(String::as_str),
            Some("Host(`a.com`)")
        );
    }

    #[test]
    fn test_into_workload_without_id_is_dropped() {
        let summary = ContainerSummary {
            names: Some(vec!["/orphan".into()]),
            ..Default::default()
        };
        assert!(into_workload(summary).is_none());
    }

    #[test]
    fn test_into_workload_without_labels_or_names() {
        let summary = ContainerSummary {
            id: Some("abc123".into()),
            ..Default::default()
        };

        let workload = into_workload(summary).unwrap();
        assert!(workload.names.is_empty());
        assert!(workload.labels.is_empty());
        assert_eq!(workload.name(), "abc123");
    }
}

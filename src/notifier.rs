//! Delivery of host diffs to the registry endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::diff::Diff;
use crate::error::NotifyError;
use crate::types::DiscoveryPayload;

/// Upper bound for one notification round trip.
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a cleaned diff. Failures are reported, never retried.
    async fn send(&self, diff: &Diff<String>) -> Result<StatusCode, NotifyError>;
}

/// Posts diffs as JSON to a single HTTP endpoint.
pub struct HttpNotifier {
    client: reqwest::Client,
    server_name: String,
    endpoint: String,
    key: Option<String>,
}

impl HttpNotifier {
    pub fn new(
        server_name: impl Into<String>,
        endpoint: impl Into<String>,
        key: Option<String>,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(NOTIFY_TIMEOUT).build()?;

        Ok(Self {
            client,
            server_name: server_name.into(),
            endpoint: endpoint.into(),
            key: key.filter(|k| !k.is_empty()),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, diff: &Diff<String>) -> Result<StatusCode, NotifyError> {
        let payload = DiscoveryPayload::new(&self.server_name, diff);

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.key {
            request = request.bearer_auth(key);
        }

        let status = request.send().await?.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status));
        }

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn diff() -> Diff<String> {
        Diff {
            added: vec!["b.com".to_string(), "a.com".to_string()],
            removed: vec!["old.com".to_string()],
        }
    }

    #[tokio::test]
    async fn test_posts_payload_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/discovery"))
            .and(header("content-type", "application/json"))
            .and(header("authorization", "Bearer s3cret"))
            .and(body_json(json!({
                "serverName": "edge-1",
                "diff": {"added": ["a.com", "b.com"], "removed": ["old.com"]}
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = HttpNotifier::new(
            "edge-1",
            format!("{}/discovery", server.uri()),
            Some("s3cret".to_string()),
        )
        .unwrap();

        let status = notifier.send(&diff()).await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_omits_authorization_without_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;

        let without_key = HttpNotifier::new("edge-1", server.uri(), None).unwrap();
        let empty_key = HttpNotifier::new("edge-1", server.uri(), Some(String::new())).unwrap();

        without_key.send(&diff()).await.unwrap();
        empty_key.send(&diff()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        for request in requests {
            assert!(request.headers.get("authorization").is_none());
        }
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let notifier = HttpNotifier::new("edge-1", server.uri(), None).unwrap();

        let err = notifier.send(&diff()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Status(s) if s == StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_invalid_endpoint_is_a_transport_error() {
        let notifier = HttpNotifier::new("edge-1", "not a url", None).unwrap();

        let err = notifier.send(&diff()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Transport(_)));
    }
}

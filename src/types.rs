//! Data structures used throughout the discovery agent.
//!
//! [`WorkloadRecord`] is our own view of a running container, decoupled
//! from the runtime client's types so the reconciliation logic never
//! depends on bollard directly.  [`DiscoveryPayload`] is the body posted
//! to the registry endpoint.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::diff::Diff;

/// A container that opted in to discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadRecord {
    /// Stable runtime identifier.
    pub id: String,
    /// Display names without Docker's leading `/`. The first is canonical.
    pub names: Vec<String>,
    /// Container labels. Ordered so host extraction is deterministic.
    pub labels: BTreeMap<String, String>,
}

impl WorkloadRecord {
    /// Canonical display name, falling back to the id.
    pub fn name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or(&self.id)
    }
}

/// JSON body sent to the registry.
///
/// ```json
/// {"serverName": "edge-1", "diff": {"added": ["a.com"], "removed": []}}
/// ```
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryPayload<'a> {
    pub server_name: &'a str,
    pub diff: Diff<String>,
}

impl<'a> DiscoveryPayload<'a> {
    /// Builds a payload with both host lists sorted.
    pub fn new(server_name: &'a str, diff: &Diff<String>) -> Self {
        Self {
            server_name,
            diff: diff.clone().sorted(),
        }
    }
}

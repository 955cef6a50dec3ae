//! Per-container hostname registry.
//!
//! The store remembers, for every container seen in the previous
//! enumeration, which hostnames it routed to. [`StateStore::reconcile`]
//! turns a fresh enumeration into the host-level delta since the last call.
//!
//! Container-level appearance and host-level changes are tracked
//! separately: a container that stays up while its router labels change
//! produces a host diff, not a container add/remove.

use std::collections::HashMap;

use log::{debug, info, trace};

use crate::diff::Diff;
use crate::labels::HostExtractor;
use crate::types::WorkloadRecord;

pub struct StateStore {
    extractor: HostExtractor,
    /// Container id -> hostnames seen on its last enumeration.
    registry: HashMap<String, Vec<String>>,
    /// The previous enumeration.
    snapshot: Vec<WorkloadRecord>,
}

impl StateStore {
    pub fn new(extractor: HostExtractor) -> Self {
        Self {
            extractor,
            registry: HashMap::new(),
            snapshot: Vec::new(),
        }
    }

    /// Records `current` as the latest enumeration and returns the host
    /// delta. The result is not cleaned; callers apply [`Diff::clean`].
    pub fn reconcile(&mut self, current: Vec<WorkloadRecord>) -> Diff<String> {
        let containers = Diff::between(&ids(&self.snapshot), &ids(&current));

        info!("Found {} enabled containers", current.len());
        if !containers.added.is_empty() {
            debug!("Found {} added containers", containers.added.len());
        }
        if !containers.removed.is_empty() {
            debug!("Found {} removed containers", containers.removed.len());
        }

        let mut global = Diff::default();

        for workload in &current {
            let hosts = self.extractor.hosts(&workload.labels);

            match self.registry.get(&workload.id) {
                Some(old) => {
                    let diff = Diff::between(old, &hosts);
                    log_diff(workload.name(), &diff);
                    global.merge(diff);
                }
                None => {
                    info!("Added {}", workload.name());
                    trace!("!> With {}", hosts.join(","));
                    global.added.extend(hosts.iter().cloned());
                }
            }

            self.registry.insert(workload.id.clone(), hosts);
        }

        for id in &containers.removed {
            let Some(hosts) = self.registry.remove(id) else {
                continue;
            };

            let name = self
                .snapshot
                .iter()
                .find(|w| &w.id == id)
                .map_or(id.as_str(), WorkloadRecord::name);
            info!("Removed {}", name);

            global.removed.extend(hosts);
        }

        self.snapshot = current;
        global
    }
}

fn ids(workloads: &[WorkloadRecord]) -> Vec<String> {
    workloads.iter().map(|w| w.id.clone()).collect()
}

fn log_diff(name: &str, diff: &Diff<String>) {
    if diff.is_empty() {
        return;
    }

    debug!(
        "[{}] (+) {} (-) {}",
        name,
        diff.added.join(","),
        diff.removed.join(",")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn workload(id: &str, rules: &[(&str, &str)]) -> WorkloadRecord {
        let mut labels = BTreeMap::from([("discovery.enable".to_string(), "true".to_string())]);
        for (router, rule) in rules {
            labels.insert(format!("traefik.http.routers.{router}.rule"), rule.to_string());
        }
        WorkloadRecord {
            id: id.to_string(),
            names: vec![format!("{id}-name")],
            labels,
        }
    }

    fn set(values: &[String]) -> BTreeSet<&str> {
        values.iter().map(String::as_str).collect()
    }

    fn store() -> StateStore {
        StateStore::new(HostExtractor::default())
    }

    #[test]
    fn test_first_sighting_adds_all_hosts() {
        let mut store = store();

        let diff = store.reconcile(vec![workload("w1", &[("web", "Host(`a.com`)")])]);

        assert_eq!(diff.added, vec!["a.com"]);
        assert!(diff.removed.is_empty());
        assert_eq!(store.registry.get("w1"), Some(&vec!["a.com".to_string()]));
    }

    #[test]
    fn test_first_sighting_keeps_duplicate_hosts() {
        let mut store = store();

        let diff = store.reconcile(vec![workload(
            "w1",
            &[("http", "Host(`a.com`)"), ("https", "Host(`a.com`)")],
        )]);

        assert_eq!(diff.added, vec!["a.com", "a.com"]);
        assert_eq!(diff.clean().added, vec!["a.com"]);
    }

    #[test]
    fn test_label_change_on_running_container() {
        let mut store = store();
        store.reconcile(vec![workload("w1", &[("web", "Host(`a.com`)")])]);

        let diff = store.reconcile(vec![workload("w1", &[("web", "Host(`b.com`)")])]);

        assert_eq!(diff.added, vec!["b.com"]);
        assert_eq!(diff.removed, vec!["a.com"]);
        assert_eq!(store.registry.get("w1"), Some(&vec!["b.com".to_string()]));
    }

    #[test]
    fn test_unchanged_enumeration_is_empty() {
        let mut store = store();
        let current = vec![
            workload("w1", &[("web", "Host(`a.com`)")]),
            workload("w2", &[("api", "Host(`b.com`) || Host(`c.com`)")]),
        ];
        store.reconcile(current.clone());

        assert!(store.reconcile(current).is_empty());
    }

    #[test]
    fn test_disappearing_container_removes_its_hosts() {
        let mut store = store();
        store.reconcile(vec![
            workload("w1", &[("web", "Host(`a.com`) || Host(`www.a.com`)")]),
            workload("w2", &[("api", "Host(`b.com`)")]),
        ]);

        let diff = store.reconcile(vec![workload("w2", &[("api", "Host(`b.com`)")])]);

        assert!(diff.added.is_empty());
        assert_eq!(set(&diff.removed), BTreeSet::from(["a.com", "www.a.com"]));
        assert!(!store.registry.contains_key("w1"));
        assert!(store.registry.contains_key("w2"));
        assert_eq!(store.snapshot.len(), 1);
    }

    #[test]
    fn test_container_losing_all_routes_keeps_empty_entry() {
        let mut store = store();
        store.reconcile(vec![workload("w1", &[("web", "Host(`a.com`)")])]);

        let diff = store.reconcile(vec![workload("w1", &[])]);
        assert_eq!(diff.removed, vec!["a.com"]);
        assert_eq!(store.registry.get("w1"), Some(&Vec::new()));

        let diff = store.reconcile(Vec::new());
        assert!(diff.is_empty());
        assert!(store.registry.is_empty());
    }

    #[test]
    fn test_host_moving_between_containers_cancels_after_clean() {
        let mut store = store();
        store.reconcile(vec![workload("w1", &[("web", "Host(`a.com`)")])]);

        let diff = store.reconcile(vec![workload("w2", &[("web", "Host(`a.com`)")])]);

        assert_eq!(diff.added, vec!["a.com"]);
        assert_eq!(diff.removed, vec!["a.com"]);
        assert!(diff.clean().is_empty());
    }

    #[test]
    fn test_replacement_container_swaps_hosts() {
        let mut store = store();
        store.reconcile(vec![workload("w1", &[("web", "Host(`a.com`)")])]);

        let diff = store
            .reconcile(vec![workload("w2", &[("web", "Host(`b.com`)")])])
            .clean();

        assert_eq!(diff.added, vec!["b.com"]);
        assert_eq!(diff.removed, vec!["a.com"]);
    }
}

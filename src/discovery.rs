//! The two periodic discovery cycles and their driver.
//!
//! * The **diff** cycle reconciles the current containers against the
//!   [`StateStore`] and reports only what changed.
//! * The **alive** cycle reports every current hostname as added. It never
//!   touches the store, so the registry can resynchronize even when
//!   increments were lost.
//!
//! Each cycle runs on its own task with its own timer. The diff cycle owns
//! its store outright, so nothing here needs a lock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, trace};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::diff::Diff;
use crate::labels::HostExtractor;
use crate::notifier::Notifier;
use crate::runtime::{ContainerSource, DISCOVERY_LABEL_FILTER};
use crate::state::StateStore;

/// One kind of discovery run.
#[async_trait]
pub trait Cycle: Send {
    fn name(&self) -> &'static str;

    /// Produce the cleaned diff to report. Failures yield an empty diff.
    async fn discover(&mut self) -> Diff<String>;
}

/// Incremental discovery backed by a [`StateStore`].
pub struct DiffCycle {
    source: Arc<dyn ContainerSource>,
    store: StateStore,
}

impl DiffCycle {
    pub fn new(source: Arc<dyn ContainerSource>, store: StateStore) -> Self {
        Self { source, store }
    }
}

#[async_trait]
impl Cycle for DiffCycle {
    fn name(&self) -> &'static str {
        "diff"
    }

    async fn discover(&mut self) -> Diff<String> {
        debug!("Starting discovery");

        let current = match self.source.list(DISCOVERY_LABEL_FILTER).await {
            Ok(current) => current,
            Err(e) => {
                error!("Encountered error during discovery: {}", e);
                return Diff::default();
            }
        };

        debug!("Cleaning diff");
        self.store.reconcile(current).clean()
    }
}

/// Full snapshot of every routed hostname.
pub struct AliveCycle {
    source: Arc<dyn ContainerSource>,
    extractor: HostExtractor,
}

impl AliveCycle {
    pub fn new(source: Arc<dyn ContainerSource>, extractor: HostExtractor) -> Self {
        Self { source, extractor }
    }
}

#[async_trait]
impl Cycle for AliveCycle {
    fn name(&self) -> &'static str {
        "alive"
    }

    async fn discover(&mut self) -> Diff<String> {
        debug!("Starting alive discovery");

        let current = match self.source.list(DISCOVERY_LABEL_FILTER).await {
            Ok(current) => current,
            Err(e) => {
                error!("Encountered error during alive discovery: {}", e);
                return Diff::default();
            }
        };
        debug!("Found {} enabled containers", current.len());

        let mut snapshot = Diff::default();
        for workload in &current {
            snapshot.added.extend(self.extractor.hosts(&workload.labels));
        }

        snapshot.clean()
    }
}

/// Forwards a diff to the notifier unless it is empty.
pub async fn process(notifier: &dyn Notifier, diff: Diff<String>) {
    trace!("Received diff: {:?}", diff);

    if diff.is_empty() {
        info!("No changes detected, skipping...");
        return;
    }

    debug!(
        "Sending diff with {} added and {} removed hosts",
        diff.added.len(),
        diff.removed.len()
    );

    match notifier.send(&diff).await {
        Ok(status) => debug!("Endpoint responded with {}", status),
        Err(e) => error!("Error sending diff: {}", e),
    }
}

/// Runs `cycle` every `period` until `shutdown` flips.
///
/// The first run happens one period after start. A run that overruns its
/// period causes the missed ticks to be skipped, never queued. Shutdown is
/// only observed between runs, so an in-flight run always completes.
pub async fn run_cycle<C: Cycle>(
    mut cycle: C,
    period: Duration,
    notifier: Arc<dyn Notifier>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("Started {} discovery loop", cycle.name());

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let diff = cycle.discover().await;
        process(notifier.as_ref(), diff).await;
    }

    info!("Stopped {} discovery loop", cycle.name());
}

/// Wires both cycles to a source and a notifier.
pub struct Scheduler {
    source: Arc<dyn ContainerSource>,
    notifier: Arc<dyn Notifier>,
    extractor: HostExtractor,
    discovery_period: Option<Duration>,
    alive_period: Option<Duration>,
}

impl Scheduler {
    /// A `None` period disables that cycle.
    pub fn new(
        source: Arc<dyn ContainerSource>,
        notifier: Arc<dyn Notifier>,
        extractor: HostExtractor,
        discovery_period: Option<Duration>,
        alive_period: Option<Duration>,
    ) -> Self {
        Self {
            source,
            notifier,
            extractor,
            discovery_period,
            alive_period,
        }
    }

    /// Spawns one task per enabled cycle.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        match self.discovery_period {
            Some(period) => {
                let cycle = DiffCycle::new(
                    Arc::clone(&self.source),
                    StateStore::new(self.extractor.clone()),
                );
                handles.push(tokio::spawn(run_cycle(
                    cycle,
                    period,
                    Arc::clone(&self.notifier),
                    shutdown.clone(),
                )));
            }
            None => info!("Disabling diff discoveries"),
        }

        match self.alive_period {
            Some(period) => {
                let cycle = AliveCycle::new(Arc::clone(&self.source), self.extractor);
                handles.push(tokio::spawn(run_cycle(
                    cycle,
                    period,
                    self.notifier,
                    shutdown,
                )));
            }
            None => info!("Disabling alive discoveries"),
        }

        handles
    }
}

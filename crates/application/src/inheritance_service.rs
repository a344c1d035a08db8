use std::sync::Arc;
use std::time::Duration;

use inheritor_core::AppResult;
use inheritor_domain::{CollectionForest, CollectionId, PermissionSnapshot, TreeBuild};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::inheritance_run::{
    ApplyOptions, DEFAULT_PACING_DELAY, ProgressSink, PropagationRun, RunReport,
};
use crate::vault_ports::VaultClient;

mod apply;
mod pacing;

use pacing::{CallClock, Pacer};

/// Propagates the permissions of one collection onto all of its descendants.
///
/// Every remote call made through a service, and through its clones, is
/// paced against the previous one, including calls made by separate
/// operations such as [`Self::load_forest`] followed by
/// [`Self::propagate_within`].
#[derive(Clone)]
pub struct InheritanceService {
    vault_client: Arc<dyn VaultClient>,
    pacing_delay: Duration,
    call_clock: CallClock,
}

impl InheritanceService {
    /// Creates an inheritance service over a vault client.
    #[must_use]
    pub fn new(vault_client: Arc<dyn VaultClient>) -> Self {
        Self {
            vault_client,
            pacing_delay: DEFAULT_PACING_DELAY,
            call_clock: CallClock::default(),
        }
    }

    /// Sets the floor used by [`Self::load_forest`] and
    /// [`Self::capture_snapshot`]. Runs use [`ApplyOptions::pacing_delay`].
    #[must_use]
    pub fn with_pacing_delay(mut self, pacing_delay: Duration) -> Self {
        self.pacing_delay = pacing_delay;
        self
    }

    fn pacer(&self, delay: Duration) -> Pacer {
        Pacer::new(delay, self.call_clock.clone())
    }

    /// Lists collections and builds the forest, logging every tree anomaly.
    pub async fn load_forest(&self) -> AppResult<TreeBuild> {
        self.load_forest_paced(&self.pacer(self.pacing_delay)).await
    }

    async fn load_forest_paced(&self, pacer: &Pacer) -> AppResult<TreeBuild> {
        pacer.settle().await;
        let records = self.vault_client.list_collections().await;
        pacer.mark_call_finished().await;
        let records = records?;

        let record_count = records.len();
        let build = CollectionForest::build(records);

        for error in &build.errors {
            warn!(diagnostic = %error, "collection tree anomaly");
        }
        info!(
            listed = record_count,
            placed = build.forest.len(),
            anomalies = build.errors.len(),
            "collection tree built"
        );

        Ok(build)
    }

    /// Captures the current grants of a collection as-is.
    pub async fn capture_snapshot(
        &self,
        collection_id: &CollectionId,
    ) -> AppResult<PermissionSnapshot> {
        let pacer = self.pacer(self.pacing_delay);
        pacer.settle().await;
        self.fetch_snapshot(collection_id, &pacer).await
    }

    async fn fetch_snapshot(
        &self,
        collection_id: &CollectionId,
        pacer: &Pacer,
    ) -> AppResult<PermissionSnapshot> {
        let entries = self.vault_client.get_permissions(collection_id).await;
        pacer.mark_call_finished().await;
        Ok(PermissionSnapshot::new(collection_id.clone(), entries?))
    }

    /// Runs the whole flow: list, build, resolve descendants, snapshot the
    /// root, then apply the snapshot to every descendant.
    pub async fn propagate(
        &self,
        root_id: &CollectionId,
        options: &ApplyOptions,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> AppResult<PropagationRun> {
        let pacer = self.pacer(options.pacing_delay);
        let build = self.load_forest_paced(&pacer).await?;

        let report = self
            .propagate_paced(&build.forest, root_id, options, progress, cancel, &pacer)
            .await?;

        Ok(PropagationRun {
            report,
            tree_errors: build.errors,
        })
    }

    /// Same as [`Self::propagate`] over a forest the caller already loaded.
    ///
    /// The first call still waits out the floor after the listing that
    /// produced `forest` when it went through this service.
    pub async fn propagate_within(
        &self,
        forest: &CollectionForest,
        root_id: &CollectionId,
        options: &ApplyOptions,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> AppResult<RunReport> {
        let pacer = self.pacer(options.pacing_delay);
        self.propagate_paced(forest, root_id, options, progress, cancel, &pacer)
            .await
    }

    // Snapshot capture shares the pacing floor with the writes that follow.
    async fn propagate_paced(
        &self,
        forest: &CollectionForest,
        root_id: &CollectionId,
        options: &ApplyOptions,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
        pacer: &Pacer,
    ) -> AppResult<RunReport> {
        let targets = forest.descendants_of(root_id)?;

        let snapshot = if pacer.wait(cancel).await {
            self.fetch_snapshot(root_id, pacer).await?
        } else {
            // Cancelled before capture: every target ends up skipped.
            PermissionSnapshot::new(root_id.clone(), Vec::new())
        };

        info!(
            root_id = %root_id,
            entries = snapshot.len(),
            descendants = targets.len(),
            "captured source permissions"
        );

        self.apply_paced(&snapshot, &targets, options, progress, cancel, pacer)
            .await
    }
}

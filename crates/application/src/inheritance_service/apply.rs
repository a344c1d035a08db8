use chrono::Utc;
use inheritor_core::AppResult;
use inheritor_domain::{CollectionNode, PermissionSnapshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{InheritanceService, Pacer};
use crate::inheritance_run::{
    ApplyOptions, ApplyOutcome, ApplyStatus, ProgressSink, RunReport, SkipReason,
};

impl InheritanceService {
    /// Overwrites the grants of every target with the snapshot, one target at
    /// a time and in the given order.
    ///
    /// A failing target is recorded and the run continues unless
    /// `stop_on_first_error` is set. Cancellation is checked between targets
    /// and yields a normal report whose unvisited targets are skipped. Only an
    /// authentication failure on the first remote call aborts with an error.
    pub async fn apply_snapshot(
        &self,
        snapshot: &PermissionSnapshot,
        targets: &[&CollectionNode],
        options: &ApplyOptions,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> AppResult<RunReport> {
        let pacer = self.pacer(options.pacing_delay);
        self.apply_paced(snapshot, targets, options, progress, cancel, &pacer)
            .await
    }

    pub(super) async fn apply_paced(
        &self,
        snapshot: &PermissionSnapshot,
        targets: &[&CollectionNode],
        options: &ApplyOptions,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
        pacer: &Pacer,
    ) -> AppResult<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = targets.len();
        let mut outcomes: Vec<ApplyOutcome> = Vec::with_capacity(total);
        let mut halted = false;
        let mut remote_calls = 0_usize;

        info!(
            run_id = %run_id,
            source_collection_id = %snapshot.source_collection_id(),
            targets = total,
            entries = snapshot.len(),
            dry_run = options.dry_run,
            "applying permission snapshot"
        );

        for target in targets {
            let outcome = if halted {
                ApplyOutcome::skipped(target, SkipReason::HaltedAfterFailure)
            } else if cancel.is_cancelled() {
                ApplyOutcome::skipped(target, SkipReason::Cancelled)
            } else if options.dry_run {
                ApplyOutcome::applied(target, true)
            } else if !pacer.wait(cancel).await {
                ApplyOutcome::skipped(target, SkipReason::Cancelled)
            } else {
                let result = self
                    .vault_client
                    .set_permissions(target.id(), snapshot.entries())
                    .await;
                pacer.mark_call_finished().await;
                remote_calls += 1;

                match result {
                    Ok(()) => ApplyOutcome::applied(target, false),
                    Err(error) if error.is_auth() && remote_calls == 1 => {
                        warn!(
                            run_id = %run_id,
                            collection_id = %target.id(),
                            error = %error,
                            "vault rejected credentials, aborting run"
                        );
                        return Err(error);
                    }
                    Err(error) => {
                        halted = options.stop_on_first_error;
                        ApplyOutcome::failed(target, error)
                    }
                }
            };

            log_outcome(run_id, &outcome);
            outcomes.push(outcome);
            if let Some(outcome) = outcomes.last() {
                progress.on_target_processed(outcome, outcomes.len(), total);
            }
        }

        let report = RunReport::new(
            run_id,
            snapshot.source_collection_id().clone(),
            options.dry_run,
            outcomes,
            started_at,
            Utc::now(),
        );

        info!(
            run_id = %run_id,
            applied = report.applied_count(),
            failed = report.failed_count(),
            skipped = report.skipped_count(),
            cancelled = report.was_cancelled(),
            "permission snapshot applied"
        );

        Ok(report)
    }
}

fn log_outcome(run_id: Uuid, outcome: &ApplyOutcome) {
    match outcome.status() {
        ApplyStatus::Applied => info!(
            run_id = %run_id,
            collection_id = %outcome.collection_id(),
            collection_name = outcome.collection_name(),
            simulated = outcome.is_simulated(),
            "collection permissions replaced"
        ),
        ApplyStatus::Failed => warn!(
            run_id = %run_id,
            collection_id = %outcome.collection_id(),
            collection_name = outcome.collection_name(),
            error = %outcome.error().map(ToString::to_string).unwrap_or_default(),
            "collection permissions not replaced"
        ),
        ApplyStatus::Skipped => debug!(
            run_id = %run_id,
            collection_id = %outcome.collection_id(),
            reason = outcome.skip_reason().map(|reason| reason.as_str()).unwrap_or_default(),
            "collection skipped"
        ),
    }
}

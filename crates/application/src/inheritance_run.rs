use std::time::Duration;

use chrono::{DateTime, Utc};
use inheritor_core::AppError;
use inheritor_domain::{CollectionId, CollectionNode, TreeError};
use uuid::Uuid;

/// Default floor between two consecutive remote calls.
///
/// The `bw` executable is slow and becomes unstable under rapid-fire calls.
pub const DEFAULT_PACING_DELAY: Duration = Duration::from_secs(1);

/// Options recognized by one apply run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Computes outcomes without writing to the vault.
    pub dry_run: bool,
    /// Minimum gap between the end of one remote call and the start of the next.
    pub pacing_delay: Duration,
    /// Halts after the first failed target and skips the remaining ones.
    pub stop_on_first_error: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            pacing_delay: DEFAULT_PACING_DELAY,
            stop_on_first_error: false,
        }
    }
}

/// Terminal state of one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStatus {
    /// Permissions were written, or would have been in a dry run.
    Applied,
    /// The target was not attempted.
    Skipped,
    /// The backend call failed.
    Failed,
}

impl ApplyStatus {
    /// Returns a stable status name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

/// Why a target was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// An earlier target failed with stop-on-first-error enabled.
    HaltedAfterFailure,
    /// The caller requested cancellation.
    Cancelled,
}

impl SkipReason {
    /// Returns a stable reason name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HaltedAfterFailure => "halted_after_failure",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Outcome recorded for one target collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    collection_id: CollectionId,
    collection_name: String,
    status: ApplyStatus,
    skip_reason: Option<SkipReason>,
    error: Option<AppError>,
    simulated: bool,
}

impl ApplyOutcome {
    /// Outcome of a target whose permissions were replaced.
    #[must_use]
    pub fn applied(target: &CollectionNode, simulated: bool) -> Self {
        Self::for_target(target, ApplyStatus::Applied, None, None, simulated)
    }

    /// Outcome of a target the backend refused or could not reach.
    #[must_use]
    pub fn failed(target: &CollectionNode, error: AppError) -> Self {
        Self::for_target(target, ApplyStatus::Failed, None, Some(error), false)
    }

    /// Outcome of a target that was never attempted.
    #[must_use]
    pub fn skipped(target: &CollectionNode, reason: SkipReason) -> Self {
        Self::for_target(target, ApplyStatus::Skipped, Some(reason), None, false)
    }

    fn for_target(
        target: &CollectionNode,
        status: ApplyStatus,
        skip_reason: Option<SkipReason>,
        error: Option<AppError>,
        simulated: bool,
    ) -> Self {
        Self {
            collection_id: target.id().clone(),
            collection_name: target.name().to_owned(),
            status,
            skip_reason,
            error,
            simulated,
        }
    }

    /// Returns the target collection id.
    #[must_use]
    pub fn collection_id(&self) -> &CollectionId {
        &self.collection_id
    }

    /// Returns the target display name.
    #[must_use]
    pub fn collection_name(&self) -> &str {
        self.collection_name.as_str()
    }

    /// Returns the terminal status.
    #[must_use]
    pub fn status(&self) -> ApplyStatus {
        self.status
    }

    /// Returns the skip reason, present iff the target was skipped.
    #[must_use]
    pub fn skip_reason(&self) -> Option<SkipReason> {
        self.skip_reason
    }

    /// Returns the failure, present iff the target failed.
    #[must_use]
    pub fn error(&self) -> Option<&AppError> {
        self.error.as_ref()
    }

    /// Returns whether the outcome comes from a dry run.
    #[must_use]
    pub fn is_simulated(&self) -> bool {
        self.simulated
    }
}

/// Receives one notification per processed target.
pub trait ProgressSink: Send + Sync {
    /// Called after `outcome` was recorded; `processed` counts it.
    fn on_target_processed(&self, outcome: &ApplyOutcome, processed: usize, total: usize);
}

impl<F> ProgressSink for F
where
    F: Fn(&ApplyOutcome, usize, usize) + Send + Sync,
{
    fn on_target_processed(&self, outcome: &ApplyOutcome, processed: usize, total: usize) {
        self(outcome, processed, total);
    }
}

/// Progress sink that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_target_processed(&self, _outcome: &ApplyOutcome, _processed: usize, _total: usize) {}
}

/// Ordered outcomes of one apply run plus aggregate counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    run_id: Uuid,
    source_collection_id: CollectionId,
    dry_run: bool,
    outcomes: Vec<ApplyOutcome>,
    applied: usize,
    failed: usize,
    skipped: usize,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Creates a report and computes its aggregate counts.
    #[must_use]
    pub fn new(
        run_id: Uuid,
        source_collection_id: CollectionId,
        dry_run: bool,
        outcomes: Vec<ApplyOutcome>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let count = |status: ApplyStatus| {
            outcomes
                .iter()
                .filter(|outcome| outcome.status() == status)
                .count()
        };
        let applied = count(ApplyStatus::Applied);
        let failed = count(ApplyStatus::Failed);
        let skipped = count(ApplyStatus::Skipped);

        Self {
            run_id,
            source_collection_id,
            dry_run,
            outcomes,
            applied,
            failed,
            skipped,
            started_at,
            finished_at,
        }
    }

    /// Returns the run identifier used in logs.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the collection whose permissions were propagated.
    #[must_use]
    pub fn source_collection_id(&self) -> &CollectionId {
        &self.source_collection_id
    }

    /// Returns whether no write was performed.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Returns outcomes in processing order.
    #[must_use]
    pub fn outcomes(&self) -> &[ApplyOutcome] {
        &self.outcomes
    }

    /// Returns the number of applied targets.
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.applied
    }

    /// Returns the number of failed targets.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed
    }

    /// Returns the number of skipped targets.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped
    }

    /// Returns the number of targets.
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns whether any target failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Returns whether the run stopped because of a cancellation request.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.outcomes
            .iter()
            .any(|outcome| outcome.skip_reason() == Some(SkipReason::Cancelled))
    }

    /// Returns when the run started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns when the run finished.
    #[must_use]
    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Returns the `N applied, M failed, K skipped` line shown to users.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} applied, {} failed, {} skipped",
            self.applied, self.failed, self.skipped
        )
    }
}

/// Report of a full propagation together with the tree diagnostics met on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationRun {
    /// Apply report over every descendant of the source collection.
    pub report: RunReport,
    /// Anomalies found while building the collection tree.
    pub tree_errors: Vec<TreeError>,
}

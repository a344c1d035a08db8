use std::fmt::Write as _;

use inheritor_application::{ApplyOutcome, ApplyStatus, RunReport};
use inheritor_core::{AppError, AppResult};
use inheritor_domain::{
    CollectionForest, CollectionId, CollectionNode, NESTED_NAME_SEPARATOR, TreeBuild,
};

/// Resolves a command-line collection reference, trying the id first and
/// the exact name second.
pub(crate) fn resolve_collection(
    forest: &CollectionForest,
    reference: &str,
) -> AppResult<CollectionId> {
    let by_id = CollectionId::new(reference)
        .ok()
        .and_then(|id| forest.find(&id));

    by_id
        .or_else(|| forest.find_by_name(reference))
        .map(|node| node.id().clone())
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "no collection with id or name '{reference}' in the tree"
            ))
        })
}

pub(crate) fn render_tree(build: &TreeBuild) -> String {
    let mut rendered = String::new();
    let mut pending: Vec<(&CollectionNode, Option<&str>)> = build
        .forest
        .roots()
        .iter()
        .rev()
        .map(|root| (root, None))
        .collect();
    while let Some((node, parent_name)) = pending.pop() {
        let _ = writeln!(
            rendered,
            "{}{} ({})",
            "  ".repeat(node.depth()),
            display_name(node.name(), parent_name),
            node.id()
        );
        pending.extend(
            node.children()
                .iter()
                .rev()
                .map(|child| (child, Some(node.name()))),
        );
    }
    for error in &build.errors {
        let _ = writeln!(rendered, "warning: {error}");
    }
    let _ = write!(
        rendered,
        "{} collections, {} diagnostics",
        build.forest.len(),
        build.errors.len()
    );
    rendered
}

// Indentation already shows the parent, so only its name prefix is dropped.
// Levels missing from the listing stay visible.
fn display_name<'a>(name: &'a str, parent_name: Option<&str>) -> &'a str {
    parent_name
        .and_then(|parent_name| name.strip_prefix(parent_name))
        .and_then(|rest| rest.strip_prefix(NESTED_NAME_SEPARATOR))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(name)
}

pub(crate) fn outcome_line(outcome: &ApplyOutcome, processed: usize, total: usize) -> String {
    let detail = match outcome.status() {
        ApplyStatus::Applied if outcome.is_simulated() => " (dry run)".to_owned(),
        ApplyStatus::Applied => String::new(),
        ApplyStatus::Failed => outcome
            .error()
            .map(|error| format!(": {error}"))
            .unwrap_or_default(),
        ApplyStatus::Skipped => outcome
            .skip_reason()
            .map(|reason| format!(" ({})", reason.as_str()))
            .unwrap_or_default(),
    };

    format!(
        "[{processed}/{total}] {} {} ({}){detail}",
        outcome.status().as_str(),
        outcome.collection_name(),
        outcome.collection_id()
    )
}

pub(crate) fn report_footer(report: &RunReport) -> String {
    let mut footer = report.summary();
    if report.is_dry_run() {
        footer.push_str(" (dry run, nothing written)");
    }
    if report.was_cancelled() {
        footer.push_str("; cancelled before all targets were processed");
    }
    footer
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use inheritor_application::{ApplyOutcome, RunReport, SkipReason};
    use inheritor_core::AppError;
    use inheritor_domain::{CollectionForest, CollectionId, CollectionRecord, TreeBuild};
    use uuid::Uuid;

    use super::{outcome_line, render_tree, report_footer, resolve_collection};

    fn build() -> TreeBuild {
        let records = CollectionRecord::from_nested_names(vec![
            ("c-eng", "Engineering"),
            ("c-ops", "Engineering/Ops"),
            ("c-oncall", "Engineering/Ops/On-call"),
            ("c-hr", "HR"),
        ]);
        assert!(records.is_ok());
        CollectionForest::build(records.unwrap_or_default())
    }

    fn id(value: &str) -> CollectionId {
        CollectionId::new(value).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn resolves_by_id_then_by_name() {
        let build = build();

        assert_eq!(
            resolve_collection(&build.forest, "c-ops").ok(),
            Some(id("c-ops"))
        );
        assert_eq!(
            resolve_collection(&build.forest, "Engineering/Ops/On-call").ok(),
            Some(id("c-oncall"))
        );
        assert!(matches!(
            resolve_collection(&build.forest, "Finance"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn tree_is_indented_by_depth() {
        let rendered = render_tree(&build());
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(
            lines,
            vec![
                "Engineering (c-eng)",
                "  Ops (c-ops)",
                "    On-call (c-oncall)",
                "HR (c-hr)",
                "4 collections, 0 diagnostics",
            ]
        );
    }

    #[test]
    fn tree_keeps_levels_missing_from_the_listing() {
        let records = CollectionRecord::from_nested_names(vec![
            ("c-team", "Team"),
            ("c-prod", "Team/Ops/Prod"),
            ("c-audit", "Audit/2024"),
        ]);
        assert!(records.is_ok());
        let rendered = render_tree(&CollectionForest::build(records.unwrap_or_default()));
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(
            lines,
            vec![
                "Team (c-team)",
                "  Ops/Prod (c-prod)",
                "Audit/2024 (c-audit)",
                "3 collections, 0 diagnostics",
            ]
        );
    }

    #[test]
    fn outcome_lines_carry_status_and_detail() {
        let build = build();
        let ops = build.forest.find(&id("c-ops"));
        assert!(ops.is_some());
        let ops = ops.unwrap_or_else(|| unreachable!());

        assert_eq!(
            outcome_line(&ApplyOutcome::applied(ops, false), 1, 2),
            "[1/2] applied Engineering/Ops (c-ops)"
        );
        assert_eq!(
            outcome_line(&ApplyOutcome::applied(ops, true), 1, 2),
            "[1/2] applied Engineering/Ops (c-ops) (dry run)"
        );
        assert_eq!(
            outcome_line(
                &ApplyOutcome::skipped(ops, SkipReason::Cancelled),
                2,
                2
            ),
            format!(
                "[2/2] skipped Engineering/Ops (c-ops) ({})",
                SkipReason::Cancelled.as_str()
            )
        );

        let failed = outcome_line(
            &ApplyOutcome::failed(ops, AppError::Transport("bw timed out".to_owned())),
            2,
            2,
        );
        assert!(failed.starts_with("[2/2] failed Engineering/Ops (c-ops): "));
        assert!(failed.contains("bw timed out"));
    }

    #[test]
    fn footer_mentions_dry_run() {
        let build = build();
        let ops = build.forest.find(&id("c-ops"));
        assert!(ops.is_some());
        let ops = ops.unwrap_or_else(|| unreachable!());
        let now = Utc::now();
        let report = RunReport::new(
            Uuid::new_v4(),
            id("c-eng"),
            true,
            vec![ApplyOutcome::applied(ops, true)],
            now,
            now,
        );

        let footer = report_footer(&report);

        assert!(footer.starts_with(&report.summary()));
        assert!(footer.contains("dry run"));
    }
}

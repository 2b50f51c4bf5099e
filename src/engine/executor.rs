//! Execution engine - apply planned changes in parallel with retries

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use policykit::retry::LogCallback;
use policykit::{CancelToken, Error, PolicyEngine, PolicyResource, RetryConfig, with_retry};
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

use super::differ::display_plan;
use super::planner::{Action, ExecutionPlan, PlannedChange};

#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Show field-level drift
    pub verbose: bool,
    /// Number of parallel jobs
    pub jobs: usize,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Attempts per policy for retryable failures
    pub retries: u32,
    /// Cancel outstanding work after the first failure
    pub fail_fast: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            verbose: false,
            jobs: 4,
            yes: false,
            retries: 3,
            fail_fast: false,
        }
    }
}

/// Result of applying one planned change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    Created { id: String },
    Updated,
    Removed,
    Failed { label: String, error: String },
    Skipped,
}

#[derive(Debug, Default)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Display the plan, confirm and apply it
pub fn execute(
    engine: &PolicyEngine,
    cancel: &CancelToken,
    plan: ExecutionPlan,
    opts: &ExecuteOptions,
) -> Result<ExecuteSummary> {
    display_plan(&plan, opts.verbose);

    let pending = plan.pending_count();
    if pending == 0 {
        return Ok(ExecuteSummary::default());
    }

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(ExecuteSummary::default());
    }

    if !opts.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(ExecuteSummary {
            skipped: pending,
            ..Default::default()
        });
    }

    println!();
    println!("  {} Applying {} policy changes...", "→".cyan(), pending);

    let changes: Vec<PlannedChange> = plan
        .changes
        .into_iter()
        .filter(|c| c.action.is_change())
        .collect();
    let results = execute_parallel(engine, cancel, changes, opts)?;

    let mut summary = ExecuteSummary::default();
    merge_summary(&mut summary, &results);
    print_failures(&results);
    print_summary(&summary);

    Ok(summary)
}

/// Apply changes on a pool of `opts.jobs` threads
fn execute_parallel(
    engine: &PolicyEngine,
    cancel: &CancelToken,
    changes: Vec<PlannedChange>,
    opts: &ExecuteOptions,
) -> Result<Vec<ApplyResult>> {
    let retry = RetryConfig {
        max_attempts: opts.retries.max(1),
        ..RetryConfig::default()
    };
    let results: Arc<Mutex<Vec<ApplyResult>>> = Arc::new(Mutex::new(Vec::new()));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .context("Failed to create apply thread pool")?;

    pool.install(|| {
        changes.into_par_iter().for_each(|change| {
            let label = change.label();
            let result = apply_one(engine, cancel, &retry, change);

            if let ApplyResult::Failed { .. } = &result
                && opts.fail_fast
                && !cancel.is_cancelled()
            {
                log::warn!("{label} failed, cancelling remaining work");
                cancel.cancel();
            }

            let symbol = match &result {
                ApplyResult::Created { .. } | ApplyResult::Updated | ApplyResult::Removed => {
                    "✓".green()
                }
                ApplyResult::Failed { .. } => "✗".red(),
                ApplyResult::Skipped => "⊘".dimmed(),
            };
            println!("    {symbol} {label}");

            push_apply_result(&results, result);
        });
    });

    into_apply_results(results)
}

/// Apply one change, retrying transient failures
pub fn apply_one(
    engine: &PolicyEngine,
    cancel: &CancelToken,
    retry: &RetryConfig,
    change: PlannedChange,
) -> ApplyResult {
    let label = change.label();
    if cancel.is_cancelled() {
        return ApplyResult::Skipped;
    }

    let PlannedChange {
        mut resource,
        action,
        ..
    } = change;
    let outcome = match action {
        Action::Create => with_retry(retry, Some(&LogCallback), || {
            create_or_resume(engine, cancel, &mut resource)
        })
        .map(|()| ApplyResult::Created {
            id: resource.id().unwrap_or_default().to_string(),
        }),
        Action::Update(_) => with_retry(retry, Some(&LogCallback), || {
            engine.update(cancel, &mut resource).map(|_| ())
        })
        .map(|()| ApplyResult::Updated),
        Action::Delete => with_retry(retry, Some(&LogCallback), || {
            delete_if_present(engine, cancel, &mut resource)
        })
        .map(|()| ApplyResult::Removed),
        Action::NoChange | Action::Protected => Ok(ApplyResult::Skipped),
    };

    match outcome {
        Ok(result) => result,
        Err(Error::Cancelled { .. }) => ApplyResult::Skipped,
        Err(e) => {
            if let Some(id) = resource.id() {
                log::debug!("{label} is bound to {id} after failure");
            }
            ApplyResult::Failed {
                label,
                error: e.to_string(),
            }
        }
    }
}

/// Create, or update when an earlier attempt already bound the record
fn create_or_resume(
    engine: &PolicyEngine,
    cancel: &CancelToken,
    resource: &mut PolicyResource,
) -> policykit::Result<()> {
    if resource.id().is_some() {
        engine.update(cancel, resource).map(|_| ())
    } else {
        engine.create(cancel, resource).map(|_| ())
    }
}

/// Delete; a policy that is already gone counts as deleted
fn delete_if_present(
    engine: &PolicyEngine,
    cancel: &CancelToken,
    resource: &mut PolicyResource,
) -> policykit::Result<()> {
    match engine.delete(cancel, resource) {
        Err(e) if e.is_not_found() => {
            resource.clear_id();
            Ok(())
        }
        other => other,
    }
}

fn push_apply_result(results: &Arc<Mutex<Vec<ApplyResult>>>, result: ApplyResult) {
    match results.lock() {
        Ok(mut locked) => locked.push(result),
        Err(poisoned) => poisoned.into_inner().push(result),
    }
}

fn into_apply_results(results: Arc<Mutex<Vec<ApplyResult>>>) -> Result<Vec<ApplyResult>> {
    let mutex = Arc::try_unwrap(results)
        .map_err(|_| anyhow::anyhow!("Failed to collect apply results: shared result state"))?;

    match mutex.into_inner() {
        Ok(collected) => Ok(collected),
        Err(poisoned) => Ok(poisoned.into_inner()),
    }
}

/// Merge results into summary
fn merge_summary(summary: &mut ExecuteSummary, results: &[ApplyResult]) {
    for result in results {
        match result {
            ApplyResult::Created { .. } => summary.created += 1,
            ApplyResult::Updated => summary.modified += 1,
            ApplyResult::Removed => summary.removed += 1,
            ApplyResult::Failed { .. } => summary.failed += 1,
            ApplyResult::Skipped => summary.skipped += 1,
        }
    }
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

fn print_failures(results: &[ApplyResult]) {
    let failures: Vec<_> = results
        .iter()
        .filter_map(|r| match r {
            ApplyResult::Failed { label, error } => Some((label, error)),
            _ => None,
        })
        .collect();
    if failures.is_empty() {
        return;
    }

    println!();
    for (label, error) in failures {
        println!("  {} {}: {}", "✗".red(), label.bold(), error);
    }
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Policies reconciled successfully!", "✓".green().bold());
    } else {
        println!("  {} Policies reconciled with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} policies created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} policies updated", summary.modified);
    }
    if summary.removed > 0 {
        println!("    • {} policies deleted", summary.removed);
    }
    if summary.skipped > 0 {
        println!("    • {} policies skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "policies".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::planner;
    use policykit::PolicyType;
    use policykit::backend::{Call, MockBackend, MockOp};
    use std::time::Duration;

    fn setup() -> (Arc<MockBackend>, PolicyEngine) {
        let mock = Arc::new(MockBackend::with_system_defaults());
        let engine = PolicyEngine::from_backend(mock.clone());
        (mock, engine)
    }

    fn plan_for(engine: &PolicyEngine, content: &str) -> ExecutionPlan {
        let config =
            Config::parse(&format!("[org]\nurl = \"https://example.okta.com\"\n{content}"))
                .unwrap();
        planner::build(engine, &CancelToken::new(), &config).unwrap()
    }

    fn opts() -> ExecuteOptions {
        ExecuteOptions {
            yes: true,
            jobs: 1,
            retries: 1,
            ..Default::default()
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_apply_creates_and_converges() {
        let (mock, engine) = setup();
        let content = "[[policy]]\ntype = \"PASSWORD\"\nname = \"MFA-Strict\"\n\
                       groups_included = [\"g1\"]\n";
        let plan = plan_for(&engine, content);

        let summary = execute(&engine, &CancelToken::new(), plan, &opts()).unwrap();
        assert_eq!(summary.created, 1);
        assert!(summary.is_success());
        assert_eq!(mock.policy_count(), PolicyType::all().len() + 1);

        // second run has nothing to do
        let plan = plan_for(&engine, content);
        assert_eq!(plan.pending_count(), 0);
    }

    #[test]
    fn test_dry_run_makes_no_calls() {
        let (mock, engine) = setup();
        let plan = plan_for(&engine, "[[policy]]\ntype = \"PASSWORD\"\nname = \"MFA-Strict\"\n");
        mock.clear_calls();

        let summary = execute(
            &engine,
            &CancelToken::new(),
            plan,
            &ExecuteOptions {
                dry_run: true,
                ..opts()
            },
        )
        .unwrap();
        assert_eq!(summary.total_changes(), 0);
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_priority_conflict_is_a_failure_but_binds() {
        let (mock, engine) = setup();
        mock.force_priority("MFA-Strict", 5);
        let plan = plan_for(
            &engine,
            "[[policy]]\ntype = \"PASSWORD\"\nname = \"MFA-Strict\"\npriority = 2\n",
        );
        let change = plan.changes.into_iter().next().unwrap();

        let result = apply_one(&engine, &CancelToken::new(), &fast_retry(3), change);
        match result {
            ApplyResult::Failed { error, .. } => assert!(error.contains("priority")),
            other => panic!("Expected failure, got {other:?}"),
        }
        // not retried: exactly one create
        let creates = mock
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Create(_)))
            .count();
        assert_eq!(creates, 1);
    }

    #[test]
    fn test_retry_after_partial_create_updates_instead() {
        let (mock, engine) = setup();
        mock.fail_on(MockOp::Activate, Some(503));
        let plan = plan_for(&engine, "[[policy]]\ntype = \"PASSWORD\"\nname = \"MFA-Strict\"\n");
        let change = plan.changes.into_iter().next().unwrap();

        let result = apply_one(&engine, &CancelToken::new(), &fast_retry(2), change);
        assert!(matches!(result, ApplyResult::Failed { .. }));

        let calls = mock.calls();
        let creates = calls.iter().filter(|c| matches!(c, Call::Create(_))).count();
        let updates = calls.iter().filter(|c| matches!(c, Call::Update(_))).count();
        assert_eq!(creates, 1);
        assert_eq!(updates, 1);
    }

    #[test]
    fn test_delete_of_vanished_policy_succeeds() {
        let (mock, engine) = setup();
        let mut seeded = policykit::PolicyResource::new(PolicyType::Password, "Legacy");
        engine.create(&CancelToken::new(), &mut seeded).unwrap();
        let plan = plan_for(
            &engine,
            "[[policy]]\ntype = \"PASSWORD\"\nname = \"Legacy\"\nensure = \"absent\"\n",
        );

        // removed out of band between plan and apply
        engine.delete(&CancelToken::new(), &mut seeded).unwrap();
        let before = mock.policy_count();

        let change = plan.changes.into_iter().next().unwrap();
        let result = apply_one(&engine, &CancelToken::new(), &fast_retry(1), change);
        assert_eq!(result, ApplyResult::Removed);
        assert_eq!(mock.policy_count(), before);
    }

    #[test]
    fn test_fail_fast_skips_remaining_work() {
        let (mock, engine) = setup();
        mock.fail_on(MockOp::Create, Some(400));
        let plan = plan_for(
            &engine,
            "[[policy]]\ntype = \"PASSWORD\"\nname = \"A\"\n\n\
             [[policy]]\ntype = \"PASSWORD\"\nname = \"B\"\n\n\
             [[policy]]\ntype = \"PASSWORD\"\nname = \"C\"\n",
        );

        let cancel = CancelToken::new();
        let summary = execute(
            &engine,
            &cancel,
            plan,
            &ExecuteOptions {
                fail_fast: true,
                ..opts()
            },
        )
        .unwrap();

        assert!(cancel.is_cancelled());
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 2);
    }

    #[test]
    fn test_without_fail_fast_all_are_attempted() {
        let (mock, engine) = setup();
        mock.fail_on(MockOp::Create, Some(400));
        let plan = plan_for(
            &engine,
            "[[policy]]\ntype = \"PASSWORD\"\nname = \"A\"\n\n\
             [[policy]]\ntype = \"PASSWORD\"\nname = \"B\"\n",
        );

        let cancel = CancelToken::new();
        let summary = execute(&engine, &cancel, plan, &opts()).unwrap();
        assert!(!cancel.is_cancelled());
        assert_eq!(summary.failed, 2);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_cancelled_token_skips() {
        let (_, engine) = setup();
        let plan = plan_for(&engine, "[[policy]]\ntype = \"PASSWORD\"\nname = \"A\"\n");
        let cancel = CancelToken::new();
        cancel.cancel();

        let change = plan.changes.into_iter().next().unwrap();
        assert_eq!(
            apply_one(&engine, &cancel, &fast_retry(1), change),
            ApplyResult::Skipped
        );
    }

    #[test]
    fn push_apply_result_handles_poisoned_mutex() {
        let results: Arc<Mutex<Vec<ApplyResult>>> = Arc::new(Mutex::new(Vec::new()));
        let poisoned = Arc::clone(&results);

        let _ = std::thread::spawn(move || {
            let _guard = poisoned
                .lock()
                .expect("lock should succeed before poisoning");
            panic!("intentional poison");
        })
        .join();

        push_apply_result(&results, ApplyResult::Skipped);
        let collected = into_apply_results(results).unwrap();
        assert_eq!(collected, vec![ApplyResult::Skipped]);
    }
}

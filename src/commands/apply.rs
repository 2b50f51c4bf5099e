use anyhow::{Result, bail};
use policykit::CancelToken;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::engine::{ExecuteOptions, execute, planner};
use crate::ui;

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let (config, engine) = super::session(ctx)?;
    if !ctx.quiet {
        ui::header(&format!("Apply to {}", config.org.url));
    }

    let cancel = CancelToken::new();
    let plan = planner::build(&engine, &cancel, &config)?;

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        verbose: ctx.verbose > 0,
        jobs: args.jobs,
        yes: args.yes,
        retries: args.retries,
        fail_fast: args.fail_fast,
    };
    let summary = execute(&engine, &cancel, plan, &opts)?;

    if !summary.is_success() {
        bail!("{} of the planned policy changes failed", summary.failed);
    }
    if summary.total_changes() > 0 {
        log::info!("{} policy changes applied", summary.total_changes());
    }
    if cancel.is_cancelled() {
        ui::warn("Apply was cancelled before all changes ran");
    }
    Ok(())
}

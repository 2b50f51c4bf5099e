use anyhow::Result;
use policykit::CancelToken;

use crate::Context;
use crate::engine::{differ, planner};
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let (config, engine) = super::session(ctx)?;
    if !ctx.quiet {
        ui::header(&format!("Plan for {}", config.org.url));
    }

    let plan = planner::build(&engine, &CancelToken::new(), &config)?;
    differ::display_plan(&plan, ctx.verbose > 0);
    Ok(())
}

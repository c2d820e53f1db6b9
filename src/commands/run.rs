//! Whole-configuration commands: apply and destroy

use anyhow::{Result, bail};

use crate::Context;
use crate::engine::{ExecuteOptions, ExecutionPlan, execute, filter_plan, plan_apply, plan_destroy};
use crate::ui;

use super::Session;

/// Bring every configured resource in line with the config file
pub fn apply(ctx: &Context, target: Option<&str>, jobs: usize) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let mut plan = plan_apply(&session.config, &session.state);
    filter_plan(&mut plan, target);
    run_plan(ctx, &mut session, plan, jobs)
}

/// Delete every tracked resource
pub fn destroy(ctx: &Context, target: Option<&str>, jobs: usize) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let mut plan = plan_destroy(&session.config, &session.state);
    filter_plan(&mut plan, target);
    run_plan(ctx, &mut session, plan, jobs)
}

fn run_plan(ctx: &Context, session: &mut Session, plan: ExecutionPlan, jobs: usize) -> Result<()> {
    if plan.is_empty() {
        if !ctx.quiet {
            ui::info("Nothing to do");
        }
        return Ok(());
    }

    let opts = ExecuteOptions {
        jobs,
        verbose: ctx.verbose > 0,
    };
    let result = execute(
        plan,
        &session.config,
        &mut session.state,
        &session.engine,
        &session.run_ctx,
        &opts,
    );
    // Persist whatever finished, even when execution itself failed
    session.save()?;

    let summary = result?;
    if !summary.is_success() {
        bail!("{} resource(s) failed", summary.failed);
    }
    Ok(())
}

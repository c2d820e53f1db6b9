//! Execution engine - runs a plan on a thread pool and folds the results
//! back into the state file

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use extexec::{Engine, RunContext, Verb};
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::resource::{Binding, Operation, Outcome};
use crate::state::StateFile;
use crate::ui;

use super::planner::{Action, ExecutionPlan, PlannedAction};

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Number of parallel jobs
    pub jobs: usize,
    /// Print program output of successful operations too
    pub verbose: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            verbose: false,
        }
    }
}

/// Summary of execution results
#[derive(Debug, Default)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub refreshed: usize,
    pub deleted: usize,
    pub gone: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Refreshed => self.refreshed += 1,
            Outcome::Deleted => self.deleted += 1,
            Outcome::Gone => self.gone += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

/// Execute the plan, updating `state` with every finished operation
pub fn execute(
    plan: ExecutionPlan,
    config: &Config,
    state: &mut StateFile,
    engine: &Engine,
    ctx: &RunContext,
    opts: &ExecuteOptions,
) -> Result<ExecuteSummary> {
    let mut summary = ExecuteSummary::default();

    for (name, reason) in &plan.skipped {
        ui::warn(&format!("Skipping {name}: {reason}"));
        summary.skipped += 1;
    }

    if !plan.actions.is_empty() {
        log::debug!(
            "Plan: {} create, {} update, {} read, {} delete",
            plan.count(Verb::Create),
            plan.count(Verb::Update),
            plan.count(Verb::Read),
            plan.count(Verb::Delete)
        );
        println!();
        println!(
            "  {} Running {} operation(s)...",
            "→".cyan(),
            plan.actions.len()
        );

        let operations = execute_parallel(&plan.actions, engine, ctx, opts.jobs)?;
        for operation in operations {
            report(&operation, opts.verbose);
            summary.add(operation.outcome);
            record_operation(state, config, operation);
        }
    }

    print_summary(&summary);
    Ok(summary)
}

/// Run every planned action on its own pool thread
fn execute_parallel(
    actions: &[PlannedAction],
    engine: &Engine,
    ctx: &RunContext,
    jobs: usize,
) -> Result<Vec<Operation>> {
    let results: Arc<Mutex<Vec<Operation>>> = Arc::new(Mutex::new(Vec::new()));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("Failed to create apply thread pool")?;

    pool.install(|| {
        actions.par_iter().for_each(|planned| {
            let operation = run_action(planned, engine, ctx);
            log::info!(
                "{} {} {}",
                operation.outcome.symbol(),
                operation.name,
                operation.outcome
            );
            push_operation(&results, operation);
        });
    });

    let mut operations = into_operations(results)?;
    // Keep output stable regardless of completion order
    operations.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(operations)
}

/// Run one planned action
pub fn run_action(planned: &PlannedAction, engine: &Engine, ctx: &RunContext) -> Operation {
    let binding = Binding {
        name: &planned.name,
        engine,
        ctx,
    };
    match &planned.action {
        Action::Create { config } => binding.create(config),
        Action::Update { config, stored } => binding.update(config, stored),
        Action::Read { config, stored } => binding.read(config, stored),
        Action::Delete {
            program,
            stored,
            orphan,
        } => {
            if *orphan {
                log::info!("{}: not in config, deleting", planned.name);
            }
            binding.delete(program, stored)
        }
    }
}

/// Persist the record of a finished operation
///
/// Failed operations leave the stored record as it was, except a create
/// that got as far as writing an id. That one is stored tainted so later
/// runs can update or delete it.
pub fn record_operation(state: &mut StateFile, config: &Config, operation: Operation) {
    let partial_create = operation.verb == Verb::Create && operation.record.exists();
    if operation.outcome == Outcome::Failed && !partial_create {
        return;
    }
    let program_delete = config
        .resources
        .get(&operation.name)
        .map(|resource| resource.programs.get(Verb::Delete).clone());
    state.record(&operation.name, operation.record, program_delete);
    if operation.outcome == Outcome::Failed {
        log::warn!("{}: create failed after writing an id, tainting", operation.name);
        state.taint(&operation.name);
    }
}

fn push_operation(results: &Arc<Mutex<Vec<Operation>>>, operation: Operation) {
    match results.lock() {
        Ok(mut locked) => locked.push(operation),
        Err(poisoned) => poisoned.into_inner().push(operation),
    }
}

fn into_operations(results: Arc<Mutex<Vec<Operation>>>) -> Result<Vec<Operation>> {
    let mutex = Arc::try_unwrap(results)
        .map_err(|_| anyhow::anyhow!("Failed to collect results: shared result state"))?;

    match mutex.into_inner() {
        Ok(collected) => Ok(collected),
        Err(poisoned) => Ok(poisoned.into_inner()),
    }
}

/// Print one operation and its diagnostics
pub fn report(operation: &Operation, verbose: bool) {
    let line = format!(
        "{} {} ({})",
        operation.name, operation.outcome, operation.verb
    );
    match operation.outcome {
        Outcome::Failed => {
            ui::error(&line);
            ui::diagnostics(&operation.diagnostics, true);
        }
        Outcome::Gone => ui::warn(&line),
        _ => {
            ui::success(&line);
            if verbose {
                ui::diagnostics(&operation.diagnostics, true);
            }
        }
    }
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() && summary.total_changes() == 0 {
        println!("  {} No changes", "✓".green().bold());
    } else if summary.is_success() {
        println!("  {} Resources are up to date", "✓".green().bold());
    } else {
        println!("  {} Finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources updated", summary.updated);
    }
    if summary.refreshed > 0 {
        println!("    • {} resources unchanged", summary.refreshed);
    }
    if summary.deleted > 0 {
        println!("    • {} resources deleted", summary.deleted);
    }
    if summary.gone > 0 {
        println!("    • {} resources no longer exist", summary.gone);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extexec::{Diagnostics, ResourceRecord};

    fn operation(name: &str, outcome: Outcome, id: &str) -> Operation {
        Operation {
            name: name.to_string(),
            verb: Verb::Read,
            outcome,
            record: ResourceRecord::new(id, "s"),
            diagnostics: Diagnostics::new(),
        }
    }

    #[test]
    fn push_operation_handles_poisoned_mutex() {
        let results: Arc<Mutex<Vec<Operation>>> = Arc::new(Mutex::new(Vec::new()));
        let poisoned = Arc::clone(&results);

        let _ = std::thread::spawn(move || {
            let _guard = poisoned
                .lock()
                .expect("lock should succeed before poisoning");
            panic!("intentional poison");
        })
        .join();

        push_operation(&results, operation("a", Outcome::Refreshed, "1"));

        let collected = into_operations(results).expect("poisoned mutex should be recovered");
        assert_eq!(collected.len(), 1);
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = ExecuteSummary::default();
        for outcome in [Outcome::Created, Outcome::Updated, Outcome::Failed, Outcome::Gone] {
            summary.add(outcome);
        }
        assert_eq!(summary.total_changes(), 2);
        assert_eq!(summary.gone, 1);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_record_operation() {
        let config = Config::parse(
            r#"
[resources.a]
program_read = ["true"]
program_update = ["true"]
program_delete = ["delete-a"]
"#,
        )
        .unwrap();
        let mut state = StateFile::default();

        record_operation(&mut state, &config, operation("a", Outcome::Created, "ID1"));
        let stored = state.get("a").unwrap();
        assert_eq!(stored.record.id, "ID1");
        assert_eq!(
            stored.program_delete.as_ref().map(|p| p.program()),
            Some("delete-a")
        );

        record_operation(&mut state, &config, operation("a", Outcome::Failed, ""));
        assert!(state.get("a").is_some());

        record_operation(&mut state, &config, operation("a", Outcome::Deleted, ""));
        assert!(state.get("a").is_none());
    }

    #[test]
    fn test_record_failed_create() {
        let config = Config::parse(
            r#"
[resources.a]
program_read = ["true"]
program_update = ["true"]
program_delete = ["delete-a"]
"#,
        )
        .unwrap();
        let mut state = StateFile::default();

        let mut failed = operation("a", Outcome::Failed, "");
        failed.verb = Verb::Create;
        record_operation(&mut state, &config, failed);
        assert!(state.get("a").is_none());

        let mut partial = operation("a", Outcome::Failed, "EXT-123");
        partial.verb = Verb::Create;
        record_operation(&mut state, &config, partial);
        let stored = state.get("a").unwrap();
        assert_eq!(stored.record.id, "EXT-123");
        assert!(stored.tainted);
        assert!(stored.program_delete.is_some());
    }
}

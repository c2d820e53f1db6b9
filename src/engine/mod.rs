//! Execution engine for custom-provider
//!
//! The engine orchestrates:
//! 1. Planning - Pick a lifecycle verb per resource from config and state
//! 2. Executing - Run the programs in parallel and record the results

pub mod executor;
pub mod planner;

pub use executor::{ExecuteOptions, execute};
pub use planner::{ExecutionPlan, filter_plan, plan_apply, plan_destroy};

//! Execution planner - decides which lifecycle verb each resource needs

use extexec::{ProgramSpec, Verb};

use crate::config::{Config, ResourceConfig};
use crate::state::{ResourceState, StateFile};

/// What to do with one resource
#[derive(Debug, Clone)]
pub enum Action {
    /// Configured, never created
    Create { config: ResourceConfig },
    /// Inputs or requested state differ from the stored record, or an
    /// earlier create did not finish
    Update {
        config: ResourceConfig,
        stored: ResourceState,
    },
    /// Nothing changed; refresh the stored record
    Read {
        config: ResourceConfig,
        stored: ResourceState,
    },
    Delete {
        program: ProgramSpec,
        stored: ResourceState,
        /// Removed from the config file
        orphan: bool,
    },
}

impl Action {
    pub fn verb(&self) -> Verb {
        match self {
            Self::Create { .. } => Verb::Create,
            Self::Update { .. } => Verb::Update,
            Self::Read { .. } => Verb::Read,
            Self::Delete { .. } => Verb::Delete,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannedAction {
    pub name: String,
    pub action: Action,
}

/// Ordered list of actions plus resources that cannot be acted on
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    pub actions: Vec<PlannedAction>,
    /// (resource name, reason)
    pub skipped: Vec<(String, String)>,
}

impl ExecutionPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.skipped.is_empty()
    }

    pub fn count(&self, verb: Verb) -> usize {
        self.actions
            .iter()
            .filter(|planned| planned.action.verb() == verb)
            .count()
    }

    fn push(&mut self, name: &str, action: Action) {
        self.actions.push(PlannedAction {
            name: name.to_string(),
            action,
        });
    }

    fn skip(&mut self, name: &str, reason: &str) {
        self.skipped.push((name.to_string(), reason.to_string()));
    }
}

/// Plan bringing every resource in line with the config file
///
/// Stored resources that are no longer configured are deleted with the
/// delete program recorded for them.
pub fn plan_apply(config: &Config, state: &StateFile) -> ExecutionPlan {
    let mut plan = ExecutionPlan::default();

    for (name, resource) in &config.resources {
        let action = match state.get(name) {
            None => Action::Create {
                config: resource.clone(),
            },
            Some(stored) if stored.tainted || needs_update(resource, stored) => Action::Update {
                config: resource.clone(),
                stored: stored.clone(),
            },
            Some(stored) => Action::Read {
                config: resource.clone(),
                stored: stored.clone(),
            },
        };
        plan.push(name, action);
    }

    for (name, stored) in state.orphans(|name| config.resources.contains_key(name)) {
        match &stored.program_delete {
            Some(program) => plan.push(
                name,
                Action::Delete {
                    program: program.clone(),
                    stored: stored.clone(),
                    orphan: true,
                },
            ),
            None => plan.skip(name, "not configured and no delete program was recorded"),
        }
    }

    plan
}

/// Plan deleting every stored resource
pub fn plan_destroy(config: &Config, state: &StateFile) -> ExecutionPlan {
    let mut plan = ExecutionPlan::default();

    for (name, stored) in &state.resources {
        let configured = config.resources.get(name);
        let program = configured
            .map(|resource| resource.programs.get(Verb::Delete))
            .or(stored.program_delete.as_ref());
        match program {
            Some(program) => plan.push(
                name,
                Action::Delete {
                    program: program.clone(),
                    stored: stored.clone(),
                    orphan: configured.is_none(),
                },
            ),
            None => plan.skip(name, "no delete program configured or recorded"),
        }
    }

    plan
}

/// Whether the configuration asks for something the stored record lacks
pub fn needs_update(config: &ResourceConfig, stored: &ResourceState) -> bool {
    config.input != stored.record.input
        || config.input_sensitive != stored.record.input_sensitive
        || config
            .state
            .as_ref()
            .is_some_and(|state| *state != stored.record.state)
}

/// Keep only actions on resources whose name contains `filter`
pub fn filter_plan(plan: &mut ExecutionPlan, filter: Option<&str>) {
    if let Some(filter) = filter {
        plan.actions.retain(|planned| planned.name.contains(filter));
        plan.skipped.retain(|(name, _)| name.contains(filter));
    }
}

//! Resource binding layer
//!
//! Maps each lifecycle verb of a configured resource onto one engine run:
//! - create runs `program_create`, or `program_update` when none is configured
//! - read sends the stored inputs and treats an empty id as "resource no
//!   longer exists"
//! - delete clears the id, but only when the program succeeded
//! - import sets the id and then reads

use extexec::{Diagnostic, Diagnostics, Engine, ProgramSpec, ResourceRecord, RunContext, Verb};
use std::fmt;

use crate::config::ResourceConfig;
use crate::state::ResourceState;

/// Result of one lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    /// Read finished and the resource still exists
    Refreshed,
    Deleted,
    /// Read reported an empty id
    Gone,
    Failed,
}

impl Outcome {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Created | Self::Updated | Self::Deleted => "✓",
            Self::Refreshed => "○",
            Self::Gone => "⊘",
            Self::Failed => "✗",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Refreshed => "up to date",
            Self::Deleted => "deleted",
            Self::Gone => "no longer exists",
            Self::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// A finished operation on one resource
#[derive(Debug)]
pub struct Operation {
    pub name: String,
    pub verb: Verb,
    pub outcome: Outcome,
    /// Record to persist; unchanged from the input when the operation failed
    pub record: ResourceRecord,
    pub diagnostics: Diagnostics,
}

impl Operation {
    pub fn is_success(&self) -> bool {
        self.outcome != Outcome::Failed
    }
}

/// A named resource bound to an engine
pub struct Binding<'a> {
    pub name: &'a str,
    pub engine: &'a Engine,
    pub ctx: &'a RunContext,
}

impl Binding<'_> {
    /// Create the resource from its configuration
    pub fn create(&self, config: &ResourceConfig) -> Operation {
        let mut record = ResourceRecord::default()
            .with_input(config.input.clone())
            .with_input_sensitive(config.input_sensitive.clone())
            .with_planned_state(config.state.clone().unwrap_or_default());
        if config.programs.create_falls_back() {
            log::debug!("{}: no program_create, running program_update", self.name);
        }
        let program = config.programs.get(Verb::Create);
        let mut diagnostics = self.engine.run(self.ctx, &mut record, Verb::Create, program);

        if !diagnostics.has_error() && !record.exists() {
            diagnostics.push(Diagnostic::error(
                format!("{} did not produce an id", Verb::Create),
                format!("command: {program}\n\nthe program must write a non-empty id"),
            ));
        }
        self.finish(Verb::Create, record, diagnostics, Outcome::Created)
    }

    /// Refresh the stored record
    ///
    /// The inputs are the ones last applied, not the configured ones, so a
    /// changed configuration is still pending after the read.
    pub fn read(&self, config: &ResourceConfig, stored: &ResourceState) -> Operation {
        let mut record = stored.record.clone();
        record.planned_state = None;
        self.read_record(config.programs.get(Verb::Read), record)
    }

    /// Push a changed configuration to an existing resource
    pub fn update(&self, config: &ResourceConfig, stored: &ResourceState) -> Operation {
        let mut record = self.existing(config, stored);
        let program = config.programs.get(Verb::Update);
        let diagnostics = self.engine.run(self.ctx, &mut record, Verb::Update, program);
        self.finish(Verb::Update, record, diagnostics, Outcome::Updated)
    }

    /// Delete an existing resource with `program`
    pub fn delete(&self, program: &ProgramSpec, stored: &ResourceState) -> Operation {
        let mut record = stored.record.clone();
        let diagnostics = self.engine.run(self.ctx, &mut record, Verb::Delete, program);
        if diagnostics.has_error() {
            return self.failed(Verb::Delete, stored.record.clone(), diagnostics);
        }
        record.id.clear();
        self.finish(Verb::Delete, record, diagnostics, Outcome::Deleted)
    }

    /// Adopt an existing resource by id, then read it
    pub fn import(&self, config: &ResourceConfig, id: &str) -> Operation {
        let record = ResourceRecord::new(id, "")
            .with_input(config.input.clone())
            .with_input_sensitive(config.input_sensitive.clone());
        self.read_record(config.programs.get(Verb::Read), record)
    }

    fn read_record(&self, program: &ProgramSpec, mut record: ResourceRecord) -> Operation {
        let diagnostics = self.engine.run(self.ctx, &mut record, Verb::Read, program);
        if !diagnostics.has_error() && !record.exists() {
            log::info!("{}: read returned an empty id", self.name);
            return self.finish(Verb::Read, record, diagnostics, Outcome::Gone);
        }
        self.finish(Verb::Read, record, diagnostics, Outcome::Refreshed)
    }

    /// Stored record with the current configuration's inputs
    fn existing(&self, config: &ResourceConfig, stored: &ResourceState) -> ResourceRecord {
        let mut record = stored.record.clone();
        record.input = config.input.clone();
        record.input_sensitive = config.input_sensitive.clone();
        record.planned_state = config.state.clone();
        record
    }

    fn finish(
        &self,
        verb: Verb,
        record: ResourceRecord,
        diagnostics: Diagnostics,
        success: Outcome,
    ) -> Operation {
        let outcome = if diagnostics.has_error() {
            Outcome::Failed
        } else {
            success
        };
        Operation {
            name: self.name.to_string(),
            verb,
            outcome,
            record,
            diagnostics,
        }
    }

    fn failed(&self, verb: Verb, record: ResourceRecord, diagnostics: Diagnostics) -> Operation {
        self.finish(verb, record, diagnostics, Outcome::Failed)
    }
}

//! Resource record access for the engine
//!
//! The engine never owns the resource record. It reads the current values
//! through [`ResourceData`] and writes results back through its setters,
//! which lets the surrounding schema layer validate or reject them.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-resource data the engine reads from and writes results into
pub trait ResourceData {
    /// Current identifier, empty before the first successful create
    fn id(&self) -> &str;

    /// State before this operation
    fn old_state(&self) -> &str;

    /// State supplied in configuration for this operation
    fn new_state(&self) -> &str;

    fn input(&self) -> &str;

    fn input_sensitive(&self) -> &str;

    /// Store the identifier written by the program
    fn set_id(&mut self, id: String) -> Result<()>;

    /// Store the state written by the program
    fn set_state(&mut self, state: String) -> Result<()>;

    /// Store a computed output
    ///
    /// Only called when outputs are enabled. The default ignores them, for
    /// schemas that fold outputs into the state.
    fn set_output(&mut self, _output: Output, _value: String) -> Result<()> {
        Ok(())
    }
}

/// Computed output attributes a program may produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Plain,
    Sensitive,
}

impl Output {
    pub const ALL: [Output; 2] = [Self::Plain, Self::Sensitive];

    /// File name inside the staging directory
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Plain => "output",
            Self::Sensitive => "output_sensitive",
        }
    }
}

/// Plain in-memory resource record
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    #[serde(default)]
    pub id: String,
    /// State recorded by the last successful operation
    #[serde(default)]
    pub state: String,
    /// State requested by configuration; `None` keeps the recorded state
    #[serde(skip)]
    pub planned_state: Option<String>,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub input_sensitive: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub output_sensitive: String,
}

impl ResourceRecord {
    pub fn new(id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: state.into(),
            ..Self::default()
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = input.into();
        self
    }

    pub fn with_input_sensitive(mut self, input: impl Into<String>) -> Self {
        self.input_sensitive = input.into();
        self
    }

    /// Request a new state for the next operation
    pub fn with_planned_state(mut self, state: impl Into<String>) -> Self {
        self.planned_state = Some(state.into());
        self
    }

    /// Whether the record refers to an existing resource
    pub fn exists(&self) -> bool {
        !self.id.is_empty()
    }
}

impl ResourceData for ResourceRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn old_state(&self) -> &str {
        &self.state
    }

    fn new_state(&self) -> &str {
        self.planned_state.as_deref().unwrap_or(&self.state)
    }

    fn input(&self) -> &str {
        &self.input
    }

    fn input_sensitive(&self) -> &str {
        &self.input_sensitive
    }

    fn set_id(&mut self, id: String) -> Result<()> {
        self.id = id;
        Ok(())
    }

    fn set_state(&mut self, state: String) -> Result<()> {
        self.state = state;
        self.planned_state = None;
        Ok(())
    }

    fn set_output(&mut self, output: Output, value: String) -> Result<()> {
        match output {
            Output::Plain => self.output = value,
            Output::Sensitive => self.output_sensitive = value,
        }
        Ok(())
    }
}

impl fmt::Debug for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRecord")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("planned_state", &self.planned_state)
            .field("input", &self.input)
            .field("input_sensitive", &"<sensitive>")
            .field("output", &self.output)
            .field("output_sensitive", &"<sensitive>")
            .finish()
    }
}

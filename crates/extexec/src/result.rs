//! Result reader - copies program results from the staging directory
//! back into the resource record

use crate::diag::Diagnostics;
use crate::error::{Error, Result};
use crate::record::{Output, ResourceData};
use crate::types::Verb;
use std::fs;
use std::io;
use std::path::Path;

/// Reads `id`, `state` and optional outputs out of a staging directory
#[derive(Debug)]
pub struct ResultReader<'a> {
    dir: &'a Path,
    verb: Verb,
}

impl<'a> ResultReader<'a> {
    pub fn new(dir: &'a Path, verb: Verb) -> Self {
        Self { dir, verb }
    }

    /// Set the record id to the exact content of the `id` file
    pub fn read_id(&self, data: &mut dyn ResourceData) -> Diagnostics {
        self.read_into("id", |text| data.set_id(text))
    }

    /// Set the record state to the exact content of the `state` file
    pub fn read_state(&self, data: &mut dyn ResourceData) -> Diagnostics {
        self.read_into("state", |text| data.set_state(text))
    }

    /// Read `output` and `output_sensitive`; a file the program never
    /// created reads as empty
    pub fn read_outputs(&self, data: &mut dyn ResourceData) -> Diagnostics {
        for output in Output::ALL {
            let name = output.file_name();
            let outcome = match read_text(&self.dir.join(name)) {
                Ok(text) => self.apply(name, || data.set_output(output, text)),
                Err(Error::ReadResult { source, .. })
                    if source.kind() == io::ErrorKind::NotFound =>
                {
                    self.apply(name, || data.set_output(output, String::new()))
                }
                Err(err) => Err(err),
            };
            if let Err(err) = outcome {
                return err.into();
            }
        }
        Diagnostics::new()
    }

    fn read_into(
        &self,
        name: &'static str,
        set: impl FnOnce(String) -> anyhow::Result<()>,
    ) -> Diagnostics {
        let outcome =
            read_text(&self.dir.join(name)).and_then(|text| self.apply(name, || set(text)));
        match outcome {
            Ok(()) => Diagnostics::new(),
            Err(err) => err.into(),
        }
    }

    fn apply(&self, field: &'static str, set: impl FnOnce() -> anyhow::Result<()>) -> Result<()> {
        set().map_err(|source| Error::ApplyResult {
            field,
            verb: self.verb.to_string(),
            source,
        })
    }
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::ReadResult {
        path: path.to_path_buf(),
        source,
    })
}

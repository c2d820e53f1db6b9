//! Engine settings shared by every operation of one provider instance

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// Default prefix of the protocol environment variables
pub const DEFAULT_PREFIX: &str = "EXT";

/// Where staging directories are created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StagingBase {
    /// The process working directory at the time of the operation
    #[default]
    WorkingDir,
    /// A fixed parent, created on demand with owner-only permissions
    Fixed(PathBuf),
}

/// Configuration constants for the engine
#[derive(Debug, Clone)]
pub struct Settings {
    /// Prefix of `<PREFIX>_DIR` and `<PREFIX>_FILE_<name>`
    pub prefix: String,
    pub staging_base: StagingBase,
    /// Environment the program inherits before protocol variables are added
    pub base_env: Vec<(OsString, OsString)>,
    /// Deadline for each program run
    pub timeout: Option<Duration>,
    /// Read `output` and `output_sensitive` back from the staging directory
    pub outputs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            staging_base: StagingBase::default(),
            base_env: std::env::vars_os().collect(),
            timeout: None,
            outputs: false,
        }
    }
}

impl Settings {
    /// Settings with an explicit, empty host environment
    pub fn isolated() -> Self {
        Self {
            base_env: Vec::new(),
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_staging_base(mut self, base: StagingBase) -> Self {
        self.staging_base = base;
        self
    }

    pub fn with_base_env(mut self, env: Vec<(OsString, OsString)>) -> Self {
        self.base_env = env;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_outputs(mut self, outputs: bool) -> Self {
        self.outputs = outputs;
        self
    }
}

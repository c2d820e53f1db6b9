//! Provider configuration loaded from `custom.toml`

use anyhow::{Context, Result, bail};
use extexec::{ProgramSpec, ProviderConfig, Settings, StagingBase, Verb};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::paths;

/// Top-level configuration file
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Provider-level input shared by every resource
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub settings: SettingsConfig,

    #[serde(default)]
    pub resources: BTreeMap<String, ResourceConfig>,
}

/// Engine settings section
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsConfig {
    /// Prefix of the protocol environment variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Parent of staging directories; the working directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Read `output` and `output_sensitive` back after each run
    #[serde(default)]
    pub outputs: bool,
}

/// One managed resource
#[derive(Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub input: String,

    #[serde(default)]
    pub input_sensitive: String,

    /// Requested state; unset keeps whatever the programs last wrote
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(flatten)]
    pub programs: Programs,

    /// Keys matching no field; rejected by validation
    #[serde(flatten)]
    pub unknown: BTreeMap<String, toml::Value>,
}

impl fmt::Debug for ResourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceConfig")
            .field("input", &self.input)
            .field("input_sensitive", &"<sensitive>")
            .field("state", &self.state)
            .field("programs", &self.programs)
            .finish()
    }
}

/// Lifecycle programs of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Programs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_create: Option<ProgramSpec>,
    pub program_read: ProgramSpec,
    pub program_update: ProgramSpec,
    pub program_delete: ProgramSpec,
}

impl Programs {
    /// Program run for `verb`; create falls back to the update program
    pub fn get(&self, verb: Verb) -> &ProgramSpec {
        match verb {
            Verb::Create => self
                .program_create
                .as_ref()
                .unwrap_or(&self.program_update),
            Verb::Read => &self.program_read,
            Verb::Update => &self.program_update,
            Verb::Delete => &self.program_delete,
        }
    }

    /// Whether create runs the update program
    pub fn create_falls_back(&self) -> bool {
        self.program_create.is_none()
    }
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::debug!(
            "Loaded {} resource(s) from {}",
            config.resources.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(prefix) = &self.settings.prefix {
            validate_prefix(prefix)?;
        }
        if self.settings.timeout_secs == Some(0) {
            bail!("settings.timeout_secs must be greater than zero");
        }
        for (name, resource) in &self.resources {
            if name.trim().is_empty() {
                bail!("Resource names must not be empty");
            }
            if let Some(key) = resource.unknown.keys().next() {
                if key.starts_with("program_") {
                    bail!(
                        "Resource '{name}' has unknown program '{key}'; expected one of \
                         program_create, program_read, program_update, program_delete"
                    );
                }
                bail!("Resource '{name}' has unknown key '{key}'");
            }
        }
        Ok(())
    }

    /// Look up a configured resource by name
    pub fn resource(&self, name: &str) -> Result<&ResourceConfig> {
        match self.resources.get(name) {
            Some(resource) => Ok(resource),
            None => bail!("Resource '{name}' is not defined in the config file"),
        }
    }

    /// Engine settings, with a CLI timeout taking precedence
    pub fn engine_settings(&self, timeout_override: Option<u64>) -> Settings {
        let staging_base = match paths::staging_dir(self.settings.staging_dir.as_deref()) {
            Some(dir) => StagingBase::Fixed(dir),
            None => StagingBase::WorkingDir,
        };
        let timeout = timeout_override
            .or(self.settings.timeout_secs)
            .map(Duration::from_secs);

        let mut settings = Settings::default()
            .with_staging_base(staging_base)
            .with_timeout(timeout)
            .with_outputs(self.settings.outputs);
        if let Some(prefix) = &self.settings.prefix {
            settings = settings.with_prefix(prefix.clone());
        }
        settings
    }
}

/// Prefixes become environment variable names
fn validate_prefix(prefix: &str) -> Result<()> {
    let valid = prefix
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        bail!("settings.prefix '{prefix}' is not a valid environment variable name");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
[provider]
input = "shared"
input_sensitive = "secret"

[settings]
prefix = "TF_CUSTOM"
timeout_secs = 30
outputs = true

[resources.greeting]
input = "hello"
program_create = ["sh", "-c", "echo create"]
program_read = ["sh", "-c", "echo read"]
program_update = ["sh", "-c", "echo update"]
program_delete = ["sh", "-c", "echo delete"]

[resources.minimal]
program_read = ["cat"]
program_update = ["true"]
program_delete = ["rm"]
"#;

    #[test]
    fn test_parse_example() {
        let config = Config::parse(EXAMPLE).unwrap();
        assert_eq!(config.provider.input, "shared");
        assert_eq!(config.settings.prefix.as_deref(), Some("TF_CUSTOM"));
        assert_eq!(config.resources.len(), 2);

        let greeting = config.resource("greeting").unwrap();
        assert_eq!(greeting.input, "hello");
        assert_eq!(greeting.input_sensitive, "");
        assert_eq!(greeting.state, None);
        assert_eq!(
            greeting.programs.get(Verb::Create).argv(),
            ["sh", "-c", "echo create"]
        );
    }

    #[test]
    fn test_create_falls_back_to_update() {
        let config = Config::parse(EXAMPLE).unwrap();
        let minimal = config.resource("minimal").unwrap();
        assert!(minimal.programs.create_falls_back());
        assert_eq!(minimal.programs.get(Verb::Create).program(), "true");
        assert_eq!(minimal.programs.get(Verb::Delete).program(), "rm");
    }

    #[test]
    fn test_missing_required_program() {
        let err = Config::parse(
            r#"
[resources.broken]
program_read = ["cat"]
program_update = ["true"]
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("program_delete"));
    }

    #[test]
    fn test_empty_program_rejected() {
        let result = Config::parse(
            r#"
[resources.broken]
program_read = []
program_update = ["true"]
program_delete = ["true"]
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_misspelled_program_rejected() {
        let err = Config::parse(
            r#"
[resources.typo]
program_craete = ["sh", "-c", "echo create"]
program_read = ["cat"]
program_update = ["true"]
program_delete = ["true"]
"#,
        )
        .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("typo"), "{message}");
        assert!(message.contains("program_craete"), "{message}");
    }

    #[test]
    fn test_unknown_resource_key_rejected() {
        let err = Config::parse(
            r#"
[resources.typo]
inptu = "hello"
program_read = ["cat"]
program_update = ["true"]
program_delete = ["true"]
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("unknown key 'inptu'"));
    }

    #[test]
    fn test_invalid_prefix() {
        let result = Config::parse("[settings]\nprefix = \"1-BAD\"\n");
        assert!(result.is_err());
        assert!(validate_prefix("EXT").is_ok());
        assert!(validate_prefix("_x1").is_ok());
        assert!(validate_prefix("").is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(Config::parse("[settings]\ntimeout_secs = 0\n").is_err());
    }

    #[test]
    fn test_unknown_resource() {
        let config = Config::parse(EXAMPLE).unwrap();
        let err = config.resource("nope").unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_engine_settings() {
        let config = Config::parse(EXAMPLE).unwrap();
        let settings = config.engine_settings(None);
        assert_eq!(settings.prefix, "TF_CUSTOM");
        assert_eq!(settings.timeout, Some(Duration::from_secs(30)));
        assert!(settings.outputs);

        let settings = config.engine_settings(Some(5));
        assert_eq!(settings.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert!(config.resources.is_empty());
        let settings = config.engine_settings(None);
        assert_eq!(settings.prefix, extexec::DEFAULT_PREFIX);
        assert_eq!(settings.timeout, None);
        assert!(!settings.outputs);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = Config::load(&dir.path().join("custom.toml")).unwrap_err();
        assert!(err.to_string().contains("Could not read config file"));
    }
}

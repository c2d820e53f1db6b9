//! Persisted resource state
//!
//! One JSON document maps resource names to the record the programs last
//! wrote. The file holds sensitive inputs and outputs, so it is written with
//! owner-only permissions.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use extexec::{ProgramSpec, ResourceRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

// ============================================================================
// State Structures
// ============================================================================

/// All tracked resources
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StateFile {
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,
}

/// Stored record of one resource
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResourceState {
    #[serde(flatten)]
    pub record: ResourceRecord,

    /// Delete program at the time of the last operation, used once the
    /// resource disappears from the config file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_delete: Option<ProgramSpec>,

    /// Created, but the create did not finish; the next apply updates it
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub tainted: bool,

    pub updated_at: DateTime<Utc>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            resources: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

// ============================================================================
// StateFile Implementation
// ============================================================================

impl StateFile {
    /// Load state from disk, or return default if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file {} does not exist, using empty state", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize state to JSON")?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(path)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ResourceState> {
        self.resources.get(name)
    }

    /// Record the outcome of an operation
    ///
    /// A record without an id no longer refers to anything and is dropped.
    pub fn record(&mut self, name: &str, record: ResourceRecord, program_delete: Option<ProgramSpec>) {
        let now = Utc::now();
        self.last_updated = now;
        if !record.exists() {
            self.resources.remove(name);
            return;
        }
        let program_delete =
            program_delete.or_else(|| self.get(name).and_then(|s| s.program_delete.clone()));
        self.resources.insert(
            name.to_string(),
            ResourceState {
                record,
                program_delete,
                tainted: false,
                updated_at: now,
            },
        );
    }

    /// Flag a stored resource as only partially created
    pub fn taint(&mut self, name: &str) {
        if let Some(stored) = self.resources.get_mut(name) {
            stored.tainted = true;
        }
    }

    /// Stored resources with the given names excluded
    pub fn orphans<'a>(
        &'a self,
        configured: impl Fn(&str) -> bool + 'a,
    ) -> impl Iterator<Item = (&'a String, &'a ResourceState)> + 'a {
        self.resources
            .iter()
            .filter(move |(name, _)| !configured(name))
    }
}

// ============================================================================
// Tests
// ============================================================================

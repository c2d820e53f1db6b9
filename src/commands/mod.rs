//! Command implementations

pub mod lifecycle;
pub mod run;
pub mod show;

use anyhow::Result;
use extexec::{Engine, RunContext};
use std::path::PathBuf;

use crate::Context;
use crate::config::Config;
use crate::paths;
use crate::state::StateFile;

/// Config, state and engine for one command invocation
pub struct Session {
    pub config: Config,
    pub state: StateFile,
    pub state_path: PathBuf,
    pub engine: Engine,
    pub run_ctx: RunContext,
}

impl Session {
    pub fn open(ctx: &Context) -> Result<Self> {
        let config_path = paths::config_file(ctx.config.as_deref());
        let config = Config::load(&config_path)?;
        let state_path = paths::state_file(ctx.state.as_deref(), &config_path);
        let state = StateFile::load(&state_path)?;
        let engine = Engine::new(
            config.engine_settings(ctx.timeout),
            config.provider.clone(),
        );
        log::debug!(
            "Using config {} and state {}",
            config_path.display(),
            state_path.display()
        );

        Ok(Self {
            config,
            state,
            state_path,
            engine,
            run_ctx: RunContext::background(),
        })
    }

    pub fn save(&self) -> Result<()> {
        self.state.save(&self.state_path)
    }
}

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::paths::{ENV_CONFIG_FILE, ENV_STATE_FILE};

#[derive(Parser)]
#[command(name = "custom-provider")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Manage arbitrary resources through your own lifecycle programs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file [default: ./custom.toml]
    #[arg(short, long, global = true, env = ENV_CONFIG_FILE)]
    pub config: Option<PathBuf>,

    /// State file [default: next to the config file]
    #[arg(short, long, global = true, env = ENV_STATE_FILE)]
    pub state: Option<PathBuf>,

    /// Kill a program that runs longer than this many seconds
    #[arg(short, long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a resource with its create (or update) program
    Create(TargetArgs),

    /// Refresh a resource with its read program
    Read(TargetArgs),

    /// Push the configured input to a resource with its update program
    Update(TargetArgs),

    /// Delete a resource with its delete program
    Delete(TargetArgs),

    /// Adopt an existing resource by id, then read it
    Import {
        /// Resource name in the config file
        name: String,

        /// Identifier of the existing resource
        id: String,
    },

    /// Create, update or refresh every configured resource
    Apply(RunArgs),

    /// Delete every tracked resource
    Destroy(RunArgs),

    /// Show tracked resources
    Show {
        /// Only show this resource
        name: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct TargetArgs {
    /// Resource name in the config file
    pub name: String,
}

#[derive(Args)]
pub struct RunArgs {
    /// Only resources whose name contains this string
    pub target: Option<String>,

    /// Number of parallel jobs
    #[arg(short, long, default_value = "4", value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: u16,
}

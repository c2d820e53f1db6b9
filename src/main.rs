mod cli;
mod commands;
mod config;
mod engine;
mod paths;
mod resource;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use extexec::Verb;
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
    pub state: Option<PathBuf>,
    pub timeout: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        state: cli.state,
        timeout: cli.timeout,
    };

    match cli.command {
        Command::Create(args) => commands::lifecycle::run(&ctx, Verb::Create, &args.name),
        Command::Read(args) => commands::lifecycle::run(&ctx, Verb::Read, &args.name),
        Command::Update(args) => commands::lifecycle::run(&ctx, Verb::Update, &args.name),
        Command::Delete(args) => commands::lifecycle::run(&ctx, Verb::Delete, &args.name),
        Command::Import { name, id } => commands::lifecycle::import(&ctx, &name, &id),
        Command::Apply(args) => {
            commands::run::apply(&ctx, args.target.as_deref(), usize::from(args.jobs))
        }
        Command::Destroy(args) => {
            commands::run::destroy(&ctx, args.target.as_deref(), usize::from(args.jobs))
        }
        Command::Show { name } => commands::show::run(&ctx, name.as_deref()),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "custom-provider", &mut io::stdout());
            Ok(())
        }
    }
}

//! Show tracked resources

use anyhow::{Result, bail};
use colored::Colorize;

use crate::Context;
use crate::state::ResourceState;
use crate::ui;

use super::Session;

pub fn run(ctx: &Context, name: Option<&str>) -> Result<()> {
    let session = Session::open(ctx)?;

    if let Some(name) = name {
        let Some(stored) = session.state.get(name) else {
            bail!("Resource '{name}' is not tracked");
        };
        print_resource(name, stored, session.config.resources.contains_key(name));
        return Ok(());
    }

    if session.state.resources.is_empty() {
        ui::info("No tracked resources");
    }
    for (name, stored) in &session.state.resources {
        print_resource(name, stored, session.config.resources.contains_key(name));
    }

    let untracked: Vec<_> = session
        .config
        .resources
        .keys()
        .filter(|name| session.state.get(name).is_none())
        .collect();
    if !untracked.is_empty() {
        ui::header("Not created yet");
        for name in untracked {
            println!("  {} {}", "○".dimmed(), name);
        }
    }
    Ok(())
}

fn print_resource(name: &str, stored: &ResourceState, configured: bool) {
    let title = if configured {
        name.to_string()
    } else {
        format!("{name} (not in config)")
    };
    ui::header(&title);

    let record = &stored.record;
    ui::kv("id", &record.id);
    if stored.tainted {
        ui::kv("status", &"tainted, create did not finish".yellow().to_string());
    }
    ui::kv("state", &ui::truncate(&record.state, 60));
    ui::kv("input", &ui::truncate(&record.input, 60));
    ui::kv("input_sensitive", &ui::mask(&record.input_sensitive));
    if !record.output.is_empty() {
        ui::kv("output", &ui::truncate(&record.output, 60));
    }
    if !record.output_sensitive.is_empty() {
        ui::kv("output_sensitive", &ui::mask(&record.output_sensitive));
    }
    ui::dim(&format!(
        "updated {}",
        stored.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
}

//! Single-resource lifecycle commands: create, read, update, delete, import

use anyhow::{Result, bail};
use extexec::Verb;

use crate::Context;
use crate::engine::executor::{record_operation, report};
use crate::resource::{Binding, Operation};
use crate::ui;

use super::Session;

/// Run one lifecycle verb on one configured resource
pub fn run(ctx: &Context, verb: Verb, name: &str) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let config = session.config.resource(name)?.clone();
    let stored = session.state.get(name).cloned();

    let binding = Binding {
        name,
        engine: &session.engine,
        ctx: &session.run_ctx,
    };
    let operation = match (verb, stored) {
        (Verb::Create, Some(stored)) => {
            bail!(
                "Resource '{name}' already exists with id {:?}; use update or import",
                stored.record.id
            )
        }
        (Verb::Create, None) => binding.create(&config),
        (_, None) => bail!("Resource '{name}' is not tracked; create or import it first"),
        (Verb::Read, Some(stored)) => binding.read(&config, &stored),
        (Verb::Update, Some(stored)) => binding.update(&config, &stored),
        (Verb::Delete, Some(stored)) => binding.delete(config.programs.get(Verb::Delete), &stored),
    };

    finish(ctx, &mut session, operation)
}

/// Adopt an existing resource by id
pub fn import(ctx: &Context, name: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        bail!("Cannot import '{name}' with an empty id");
    }
    let mut session = Session::open(ctx)?;
    let config = session.config.resource(name)?.clone();
    if let Some(stored) = session.state.get(name) {
        ui::warn(&format!(
            "Replacing tracked id {:?} of '{name}'",
            stored.record.id
        ));
    }

    let binding = Binding {
        name,
        engine: &session.engine,
        ctx: &session.run_ctx,
    };
    let operation = binding.import(&config, id);
    finish(ctx, &mut session, operation)
}

fn finish(ctx: &Context, session: &mut Session, operation: Operation) -> Result<()> {
    report(&operation, ctx.verbose > 0);
    let success = operation.is_success();
    let verb = operation.verb;
    let name = operation.name.clone();

    record_operation(&mut session.state, &session.config, operation);
    session.save()?;

    if !success {
        bail!("{verb} of '{name}' failed");
    }
    Ok(())
}

//! `processframes`: walk an importer's frames and run commands against each one.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::batch::CleanupGuard;
use crate::context::{Context, Object};
use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::protocol::command::ProcessFrames;
use crate::registry::{ObjectType, Selector, Shared, lock};
use crate::reply::Reply;

/// Stops at the first failing command; `cleanupcommands` run regardless.
#[tracing::instrument(level = "debug", skip(ctx, process), fields(frames = process.instructions.len(), local = process.local_context))]
pub(super) fn run(ctx: &mut Context, receiver: &Selector, process: ProcessFrames) -> MovingImagesResult<Reply> {
    let resolved = ctx.objects.resolve(receiver)?;
    if resolved.kind != ObjectType::MovieImporter {
        return Err(MovingImagesError::invalid_receiver(format!(
            "'processframes' cannot be sent to a {}",
            resolved.kind
        )));
    }
    let importer = resolved.handle;

    let mut local = process.local_context.then(|| ctx.local());
    let target: &mut Context = match local.as_mut() {
        Some(local) => local,
        None => ctx,
    };

    let mut guard = CleanupGuard::new(target, &process.cleanup);
    let reply = frames(guard.context(), &importer, &process);
    let cleanup = guard.finish();
    Ok(match (reply, cleanup) {
        (Ok(reply), None) => reply,
        (Ok(_), Some(failure)) => failure,
        (Err(failure), _) => failure,
    })
}

/// `Err` carries the failing command's reply.
fn frames(ctx: &mut Context, importer: &Shared<Object>, process: &ProcessFrames) -> Result<Reply, Reply> {
    run_until_failure(ctx, &process.preprocess)?;
    for (index, instruction) in process.instructions.iter().enumerate() {
        let grabbed = match &mut *lock(importer) {
            Object::Importer(i) => i.grab(&instruction.grab),
            other => Err(MovingImagesError::invalid_receiver(format!(
                "'processframes' cannot be sent to a {}",
                other.kind()
            ))),
        };
        let (frame, duration) = grabbed.map_err(Reply::from)?;
        tracing::trace!(index, width = frame.width, height = frame.height, "frame grabbed");
        ctx.images.insert(process.identifier.clone(), Arc::new(frame));
        if let Some(key) = &process.duration_key {
            ctx.variables.set(key.clone(), json!(duration));
        }
        run_until_failure(ctx, &instruction.commands)?;
    }
    run_until_failure(ctx, &process.postprocess)
}

fn run_until_failure(ctx: &mut Context, commands: &[Value]) -> Result<Reply, Reply> {
    let mut last = Reply::ok();
    for command in commands {
        last = crate::dispatch::execute(ctx, command);
        if !last.is_ok() {
            return Err(last);
        }
    }
    Ok(last)
}

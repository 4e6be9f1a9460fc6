//! Batch orchestration: ordered execution, guaranteed cleanup and the asynchronous path.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use crate::context::Context;
use crate::dispatch::{self, execute};
use crate::protocol::batch::CommandBatch;
use crate::registry::lock;
use crate::reply::{ErrorCode, Reply};

/// Runs a cleanup list when dropped unless [`CleanupGuard::finish`] already did.
///
/// Holding the context inside the guard lets the cleanup run on every exit path of the body,
/// unwinding included.
pub(crate) struct CleanupGuard<'a> {
    ctx: &'a mut Context,
    commands: &'a [Value],
    done: bool,
}

impl<'a> CleanupGuard<'a> {
    pub(crate) fn new(ctx: &'a mut Context, commands: &'a [Value]) -> Self {
        Self {
            ctx,
            commands,
            done: false,
        }
    }

    pub(crate) fn context(&mut self) -> &mut Context {
        self.ctx
    }

    /// Run the cleanup list now. Returns its first failure.
    pub(crate) fn finish(mut self) -> Option<Reply> {
        self.done = true;
        run_cleanup(self.ctx, self.commands)
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.done = true;
            run_cleanup(self.ctx, self.commands);
        }
    }
}

fn run_cleanup(ctx: &mut Context, commands: &[Value]) -> Option<Reply> {
    let mut first_failure = None;
    for (index, command) in commands.iter().enumerate() {
        let reply = execute(ctx, command);
        if !reply.is_ok() {
            tracing::warn!(
                index,
                code = reply.code().as_u32(),
                detail = reply.string_value().unwrap_or_default(),
                "cleanup command failed"
            );
            first_failure.get_or_insert(reply);
        }
    }
    first_failure
}

/// Run `commands` in order. A failure does not stop later commands; the result is the first
/// failure, or the last reply, or an empty success for an empty list.
pub(crate) fn run_commands(ctx: &mut Context, commands: &[Value]) -> Reply {
    let mut first_failure: Option<Reply> = None;
    let mut last = Reply::ok();
    for command in commands {
        let reply = execute(ctx, command);
        if reply.is_ok() {
            last = reply;
        } else if first_failure.is_none() {
            first_failure = Some(reply);
        }
    }
    first_failure.unwrap_or(last)
}

/// Run a batch synchronously: bind its variables, run its commands, then its cleanup list.
///
/// Cleanup failures are logged and only become the result when the main list succeeded.
#[tracing::instrument(level = "debug", skip_all, fields(commands = batch.commands.len(), cleanup = batch.cleanup_commands.len()))]
pub fn run_batch(ctx: &mut Context, batch: &CommandBatch) -> Reply {
    ctx.variables.append(&batch.variables);
    let mut guard = CleanupGuard::new(ctx, &batch.cleanup_commands);
    let main = run_commands(guard.context(), &batch.commands);
    let cleanup = guard.finish();
    match cleanup {
        Some(failure) if main.is_ok() => failure,
        _ => main,
    }
}

/// Structural check of every command of a batch, without a context.
pub fn validate_batch(batch: &CommandBatch, max_draw_depth: usize) -> Reply {
    let lists = [("commands", &batch.commands), ("cleanupcommands", &batch.cleanup_commands)];
    for (list, commands) in lists {
        for (index, command) in commands.iter().enumerate() {
            if let Err(e) = dispatch::validate(command, max_draw_depth) {
                return Reply::error(e.code(), format!("{list}[{index}]: {e}"));
            }
        }
    }
    Reply::number((batch.commands.len() + batch.cleanup_commands.len()) as f64)
}

/// Completion of a batch started with [`run_batch_async`].
#[derive(Debug)]
pub struct BatchHandle {
    rx: mpsc::Receiver<Reply>,
}

impl BatchHandle {
    /// Block until the batch finishes.
    pub fn wait(self) -> Reply {
        self.rx.recv().unwrap_or_else(|_| worker_lost())
    }

    /// Block for at most `timeout`; `None` if the batch is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Reply> {
        match self.rx.recv_timeout(timeout) {
            Ok(reply) => Some(reply),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => Some(worker_lost()),
        }
    }
}

fn worker_lost() -> Reply {
    Reply::error(ErrorCode::OperationFailed, "batch worker stopped without a reply")
}

/// Run a batch on the rayon pool. `callback` is called exactly once with the final reply,
/// before the reply is handed to the returned [`BatchHandle`].
pub fn run_batch_async<F>(ctx: Arc<Mutex<Context>>, batch: CommandBatch, callback: F) -> BatchHandle
where
    F: FnOnce(&Reply) + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    rayon::spawn(move || {
        let reply = {
            let mut guard = lock(&ctx);
            run_batch(&mut guard, &batch)
        };
        callback(&reply);
        // The handle may already be gone; the callback has seen the reply.
        let _ = tx.send(reply);
    });
    BatchHandle { rx }
}

/// Run a batch against a shared context, through the asynchronous path when the batch asks
/// for `runasynchronously`.
pub fn run_batch_shared(ctx: &Arc<Mutex<Context>>, batch: CommandBatch) -> Reply {
    if batch.run_asynchronously {
        return run_batch_async(Arc::clone(ctx), batch, |reply| {
            tracing::debug!(code = reply.code().as_u32(), "asynchronous batch finished");
        })
        .wait();
    }
    run_batch(&mut lock(ctx), &batch)
}

#[cfg(test)]
#[path = "../tests/unit/batch.rs"]
mod tests;

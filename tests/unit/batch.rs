use serde_json::json;

use super::*;
use crate::media::backend::UnavailableBackend;

fn context() -> Context {
    Context::with_backend(Arc::new(UnavailableBackend))
}

fn create_editor(name: &str) -> Value {
    json!({"command": "create", "objecttype": "movieeditor", "objectname": name})
}

fn close_editor(name: &str) -> Value {
    json!({
        "command": "close",
        "receiverobject": {"objecttype": "movieeditor", "objectname": name}
    })
}

#[test]
fn empty_batch_succeeds() {
    let mut ctx = context();
    let reply = run_batch(&mut ctx, &CommandBatch::default());
    assert_eq!(reply, Reply::ok());
}

#[test]
fn first_failure_wins_and_later_commands_still_run() {
    let mut ctx = context();
    let batch = CommandBatch::new(vec![
        json!({"command": "removeimagefromcollection", "imageidentifier": "nothing"}),
        create_editor("a"),
        json!({"command": "explode"}),
    ]);
    let reply = run_batch(&mut ctx, &batch);
    assert_eq!(reply.code(), ErrorCode::InvalidImageIdentifier);
    assert_eq!(ctx.object_count(None), 1);
}

#[test]
fn last_reply_of_a_clean_run() {
    let mut ctx = context();
    let batch = CommandBatch::new(vec![create_editor("a"), create_editor("b")]);
    assert_eq!(run_batch(&mut ctx, &batch).number_value(), Some(1.0));
}

#[test]
fn cleanup_runs_after_a_failure() {
    let mut ctx = context();
    let batch = CommandBatch::new(vec![
        create_editor("cut"),
        json!({"command": "createtrack", "receiverobject": {"objecttype": "movieeditor", "objectname": "cut"}, "mediatype": "soun"}),
    ])
    .with_cleanup(vec![close_editor("cut")]);
    let reply = run_batch(&mut ctx, &batch);
    assert_eq!(reply.code(), ErrorCode::OperationFailed);
    assert_eq!(ctx.object_count(None), 0);
}

#[test]
fn cleanup_failure_surfaces_only_after_success() {
    let mut ctx = context();
    let ok_main = CommandBatch::new(vec![create_editor("a")]).with_cleanup(vec![close_editor("missing")]);
    assert_eq!(run_batch(&mut ctx, &ok_main).code(), ErrorCode::InvalidReceiverObject);

    let failing_main = CommandBatch::new(vec![json!({"command": "explode"})])
        .with_cleanup(vec![close_editor("missing")]);
    assert_eq!(run_batch(&mut ctx, &failing_main).code(), ErrorCode::InvalidCommand);
}

#[test]
fn batch_variables_bind_before_commands() {
    let mut ctx = context();
    let mut vars = serde_json::Map::new();
    vars.insert("side".into(), json!(8));
    let batch = CommandBatch::new(vec![json!({
        "command": "create",
        "objecttype": "bitmapcontext",
        "size": {"width": "$side * 2", "height": "$side"}
    })])
    .with_variables(vars);
    assert!(run_batch(&mut ctx, &batch).is_ok());
    let width = execute(
        &mut ctx,
        &json!({"command": "getproperty", "receiverobject": {"objectreference": 0}, "propertykey": "width"}),
    );
    assert_eq!(width.number_value(), Some(16.0));
}

#[test]
fn guard_cleans_up_when_dropped() {
    let mut ctx = context();
    execute(&mut ctx, &create_editor("temp"));
    let cleanup = [close_editor("temp")];
    {
        let mut guard = CleanupGuard::new(&mut ctx, &cleanup);
        assert_eq!(guard.context().object_count(None), 1);
    }
    assert_eq!(ctx.object_count(None), 0);
}

#[test]
fn validation_reports_the_failing_position() {
    let batch = CommandBatch::new(vec![create_editor("a"), json!({"command": "create"})])
        .with_cleanup(vec![close_editor("a")]);
    let reply = validate_batch(&batch, 32);
    assert_eq!(reply.code(), ErrorCode::InvalidParameter);
    assert!(reply.string_value().unwrap().starts_with("commands[1]: "));

    let fine = CommandBatch::new(vec![create_editor("a")]).with_cleanup(vec![close_editor("a")]);
    assert_eq!(validate_batch(&fine, 32).number_value(), Some(2.0));
}

#[test]
fn validation_accepts_unbound_paths() {
    let batch = CommandBatch::new(vec![json!({
        "command": "create",
        "objecttype": "movieimporter",
        "pathsubstitution": "later"
    })]);
    assert!(validate_batch(&batch, 32).is_ok());
}

#[test]
fn async_batch_reports_through_callback_and_handle() {
    let ctx = Arc::new(Mutex::new(context()));
    let (tx, rx) = mpsc::channel();
    let handle = run_batch_async(
        Arc::clone(&ctx),
        CommandBatch::new(vec![create_editor("bg")]),
        move |reply| {
            let _ = tx.send(reply.clone());
        },
    );
    let reply = handle.wait();
    assert!(reply.is_ok());
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), reply);
    assert_eq!(lock(&ctx).object_count(None), 1);
}

#[test]
fn shared_runner_honours_runasynchronously() {
    let ctx = Arc::new(Mutex::new(context()));
    let mut batch = CommandBatch::new(vec![create_editor("a")]);
    batch.run_asynchronously = true;
    assert!(run_batch_shared(&ctx, batch).is_ok());
    assert!(run_batch_shared(&ctx, CommandBatch::new(vec![create_editor("b")])).is_ok());
    assert_eq!(lock(&ctx).object_count(None), 2);
}

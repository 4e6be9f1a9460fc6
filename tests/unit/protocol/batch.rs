use serde_json::json;

use super::*;

#[test]
fn wire_keys() {
    let batch = CommandBatch::from_json(&json!({
        "commands": [{"command": "closeall"}],
        "cleanupcommands": [{"command": "closeall"}, {"command": "closeall"}],
        "variables": {"w": 4},
        "runasynchronously": true
    }))
    .unwrap();
    assert_eq!(batch.commands.len(), 1);
    assert_eq!(batch.cleanup_commands.len(), 2);
    assert_eq!(batch.variables["w"], json!(4));
    assert!(batch.run_asynchronously);
}

#[test]
fn everything_is_optional_but_shape_is_checked() {
    assert_eq!(CommandBatch::from_json(&json!({})).unwrap(), CommandBatch::default());
    assert!(matches!(
        CommandBatch::from_json(&json!([1, 2])),
        Err(MovingImagesError::InvalidCommand(_))
    ));
    assert!(matches!(
        CommandBatch::from_json_str(r#"{"commands": 3}"#),
        Err(MovingImagesError::InvalidParameter(_))
    ));
}

#[test]
fn builder_serializes_compactly() {
    let batch = CommandBatch::new(vec![json!({"command": "closeall"})]);
    assert_eq!(
        serde_json::to_value(&batch).unwrap(),
        json!({"commands": [{"command": "closeall"}], "runasynchronously": false})
    );
}

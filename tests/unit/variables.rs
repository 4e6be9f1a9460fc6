use super::*;
use serde_json::json;

fn map(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

#[test]
fn append_then_drop() {
    let mut vars = Variables::new();
    vars.append(&map(json!({"a": 1, "b": "x"})));
    vars.append(&map(json!({"a": 2})));
    assert_eq!(vars.get("a"), Some(&json!(2)));
    assert_eq!(vars.len(), 2);

    vars.drop_keys(&map(json!({"a": null})));
    assert!(vars.get("a").is_none());
    assert_eq!(vars.len(), 1);
}

#[test]
fn missing_path_substitution_is_missing_variable() {
    let vars = Variables::new();
    let err = vars.substitute_path("exportfile").unwrap_err();
    assert!(matches!(err, MovingImagesError::MissingVariable(_)));
}

#[test]
fn path_substitution_requires_string() {
    let mut vars = Variables::new();
    vars.set("out", json!("/tmp/out.png"));
    vars.set("bad", json!(3));
    assert_eq!(vars.substitute_path("out").unwrap(), "/tmp/out.png");
    assert!(matches!(
        vars.substitute_path("bad"),
        Err(MovingImagesError::InvalidParameter(_))
    ));
}

#[test]
fn numeric_views() {
    let mut vars = Variables::new();
    vars.append(&map(json!({
        "n": 2.5,
        "s": " 4 ",
        "flag": true,
        "dur": {"flags": 1, "value": 25, "timescale": 600, "epoch": 0},
        "list": [1, 2]
    })));
    assert_eq!(vars.number("n").unwrap(), Some(2.5));
    assert_eq!(vars.number("s").unwrap(), Some(4.0));
    assert_eq!(vars.number("flag").unwrap(), Some(1.0));
    assert!((vars.number("dur").unwrap().unwrap() - 25.0 / 600.0).abs() < 1e-12);
    assert!(vars.number("list").is_err());
    assert_eq!(vars.number("absent").unwrap(), None);
}

use super::*;
use serde_json::json;

fn bound() -> Variables {
    let mut vars = Variables::new();
    vars.set("w", json!(400));
    vars.set("half", json!(0.5));
    vars
}

#[test]
fn numbers_and_equations() {
    let vars = bound();
    let v = json!({"a": 3, "b": "$w * $half", "c": "=2 + 2"});
    let f = Fields::new(&v, Some(&vars)).unwrap();
    assert_eq!(f.f64("a").unwrap(), 3.0);
    assert_eq!(f.f64("b").unwrap(), 200.0);
    assert_eq!(f.f64("c").unwrap(), 4.0);
    assert!(matches!(
        f.f64("missing"),
        Err(MovingImagesError::InvalidParameter(_))
    ));
}

#[test]
fn validation_mode_only_compiles_equations() {
    let v = json!({"ok": "$nobody + 1", "bad": "1 +"});
    let f = Fields::new(&v, None).unwrap();
    assert_eq!(f.f64("ok").unwrap(), 0.0);
    assert!(f.f64("bad").is_err());
}

#[test]
fn unbound_equation_variable_is_missing_variable() {
    let vars = bound();
    let v = json!({"x": "$nobody"});
    let f = Fields::new(&v, Some(&vars)).unwrap();
    assert!(matches!(
        f.f64("x"),
        Err(MovingImagesError::MissingVariable(_))
    ));
}

#[test]
fn geometry_and_colour() {
    let v = json!({
        "rect": {"origin": {"x": 10, "y": 20}, "size": {"width": -5, "height": 8}},
        "color": {"red": 0.8, "green": 0.3, "blue": 0.1, "colorcolorprofilename": "kCGColorSpaceSRGB"}
    });
    let f = Fields::new(&v, None).unwrap();
    assert_eq!(f.rect("rect").unwrap(), Rect::new(5.0, 20.0, 10.0, 28.0));
    let c = f.color("color").unwrap();
    assert_eq!(c.alpha, 1.0);
    assert_eq!(c.to_rgba8(), [204, 77, 26, 255]);
}

#[test]
fn times_in_both_shapes() {
    let v = json!({
        "full": {"flags": 1, "value": 3000, "timescale": 600, "epoch": 0},
        "secs": {"time": 1.5},
        "range": {"start": {"time": 0}, "duration": {"value": 20, "timescale": 10}}
    });
    let f = Fields::new(&v, None).unwrap();
    assert_eq!(f.time("full").unwrap(), MediaTime::new(3000, 600));
    assert_eq!(f.time("secs").unwrap(), MediaTime::new(9000, 6000));
    let r = f.time_range("range").unwrap();
    assert_eq!(r.duration.seconds(), 2.0);
}

#[test]
fn transformation_steps_apply_in_listed_order() {
    let v = json!({"contexttransformation": [
        {"transformationtype": "translate", "translation": {"x": 100, "y": 0}},
        {"transformationtype": "scale", "scale": {"x": 2, "y": 2}}
    ]});
    let f = Fields::new(&v, None).unwrap();
    let a = f.transform().unwrap();
    let p = a * Point::new(1.0, 1.0);
    assert_eq!(p, Point::new(102.0, 2.0));
}

#[test]
fn affine_dictionary_and_identity_default() {
    let v = json!({"affinetransform": {"m11": 1, "m12": 0, "m21": 0, "m22": 1, "tX": 5, "tY": 6}});
    let f = Fields::new(&v, None).unwrap();
    assert_eq!(f.transform().unwrap(), Affine::translate((5.0, 6.0)));
    let empty = json!({});
    assert_eq!(
        Fields::new(&empty, None).unwrap().transform().unwrap(),
        Affine::IDENTITY
    );
}

#[test]
fn booleans_accept_several_spellings() {
    let v = json!({"a": true, "b": "NO", "c": 1, "d": [1]});
    let f = Fields::new(&v, None).unwrap();
    assert_eq!(f.opt_bool("a").unwrap(), Some(true));
    assert_eq!(f.opt_bool("b").unwrap(), Some(false));
    assert_eq!(f.opt_bool("c").unwrap(), Some(true));
    assert_eq!(f.opt_bool("z").unwrap(), None);
    assert!(f.opt_bool("d").is_err());
}

use super::*;
use serde_json::json;

fn path_of(v: serde_json::Value) -> MovingImagesResult<BezPath> {
    parse_path(&Fields::new(&v, None).unwrap())
}

#[test]
fn lines_and_close() {
    let p = path_of(json!({
        "startpoint": {"x": 0, "y": 0},
        "arrayofpathelements": [
            {"elementtype": "pathlineto", "endpoint": {"x": 10, "y": 0}},
            {"elementtype": "pathlineto", "endpoint": {"x": 10, "y": 10}},
            {"elementtype": "closesubpath"}
        ]
    }))
    .unwrap();
    assert_eq!(p.elements().len(), 4);
    assert_eq!(p.bounding_box(), Rect::new(0.0, 0.0, 10.0, 10.0));
}

#[test]
fn line_without_current_point_is_rejected() {
    let err = path_of(json!({
        "arrayofpathelements": [{"elementtype": "pathlineto", "endpoint": {"x": 1, "y": 1}}]
    }))
    .unwrap_err();
    assert!(matches!(err, MovingImagesError::InvalidParameter(_)));
}

#[test]
fn shapes_extend_bounds() {
    let p = path_of(json!({
        "arrayofpathelements": [
            {"elementtype": "pathrectangle", "rect": {"origin": {"x": 0, "y": 0}, "size": {"width": 4, "height": 2}}},
            {"elementtype": "pathoval", "rect": {"origin": {"x": 10, "y": 10}, "size": {"width": 2, "height": 2}}}
        ]
    }))
    .unwrap();
    let bb = p.bounding_box();
    assert!((bb.x1 - 12.0).abs() < 1e-6 && (bb.y1 - 12.0).abs() < 1e-6);
}

#[test]
fn arc_sweeps_anticlockwise_by_default() {
    let p = path_of(json!({
        "arrayofpathelements": [{
            "elementtype": "pathaddarc",
            "centerpoint": {"x": 0, "y": 0},
            "radius": 10,
            "startangle": 0,
            "endangle": std::f64::consts::FRAC_PI_2
        }]
    }))
    .unwrap();
    let bb = p.bounding_box();
    assert!(bb.x0 > -1e-6 && bb.y0 > -1e-6);
    assert!((bb.x1 - 10.0).abs() < 1e-6 && (bb.y1 - 10.0).abs() < 1e-6);
}

#[test]
fn clockwise_arc_goes_the_long_way() {
    let p = path_of(json!({
        "arrayofpathelements": [{
            "elementtype": "pathaddarc",
            "centerpoint": {"x": 0, "y": 0},
            "radius": 10,
            "startangle": 0,
            "endangle": std::f64::consts::FRAC_PI_2,
            "clockwise": true
        }]
    }))
    .unwrap();
    let bb = p.bounding_box();
    assert!(bb.x0 < -9.0 && bb.y0 < -9.0);
}

#[test]
fn rounded_rect_radii_order() {
    let v = json!({"radiuses": [0, 0, 0, 5]});
    let f = Fields::new(&v, None).unwrap();
    let p = rounded_rect(Rect::new(0.0, 0.0, 20.0, 20.0), &f).unwrap();
    // Only the bottom-left corner (min x, min y in y-up space) is rounded.
    assert!(!p.contains(Point::new(0.2, 0.2)));
    assert!(p.contains(Point::new(19.9, 0.1)));
    assert!(p.contains(Point::new(0.1, 19.9)));

    let bad = json!({"radiuses": [1, 2]});
    assert!(rounded_rect(Rect::new(0.0, 0.0, 1.0, 1.0), &Fields::new(&bad, None).unwrap()).is_err());
}

#[test]
fn polyline_is_open() {
    let p = polyline(&[Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)]);
    assert_eq!(p.elements().len(), 3);
    assert!(!p.elements().contains(&PathEl::ClosePath));
}

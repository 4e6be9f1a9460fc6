use super::*;
use serde_json::json;

const TRACKS: [(u32, &str); 3] = [(1, "soun"), (2, "vide"), (3, "vide")];

fn selector(v: Value) -> TrackSelector {
    let outer = json!({});
    let f = Fields::new(&outer, None).unwrap();
    TrackSelector::parse(&f, &v).unwrap()
}

#[test]
fn select_by_id_and_number() {
    assert_eq!(selector(json!({"trackid": 3})).position(TRACKS).unwrap(), 2);
    assert_eq!(selector(json!(2)).position(TRACKS).unwrap(), 1);
}

#[test]
fn select_by_characteristic_index() {
    let visual = selector(json!({"mediacharacteristic": VISUAL, "trackindex": 1}));
    assert_eq!(visual.position(TRACKS).unwrap(), 2);
    let audio = selector(json!({"mediatype": "soun"}));
    assert_eq!(audio.position(TRACKS).unwrap(), 0);
    let missing = selector(json!({"mediatype": "soun", "trackindex": 1}));
    assert!(matches!(
        missing.position(TRACKS),
        Err(MovingImagesError::InvalidParameter(_))
    ));
}

#[test]
fn empty_selector_is_rejected() {
    let outer = json!({});
    let f = Fields::new(&outer, None).unwrap();
    assert!(TrackSelector::parse(&f, &json!({"trackindex": 0})).is_err());
    assert!(TrackSelector::parse(&f, &json!({"trackid": 1.5})).is_err());
}

#[test]
fn only_video_is_frame_based() {
    let f = TrackFilter::Characteristic(FRAME_BASED.to_owned());
    assert_eq!(TRACKS.iter().filter(|(_, m)| f.matches(m)).count(), 2);
    assert!(!is_visual("soun"));
    assert_eq!(MEDIA_TYPES.join(" "), "soun clcp meta muxx sbtl text tmcd vide");
}

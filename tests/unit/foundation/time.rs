use super::*;

#[test]
fn five_seconds_at_600_round_trips_through_json() {
    let t = MediaTime::new(3000, 600);
    let s = t.to_json_string();
    assert_eq!(s, r#"{"flags":1,"value":3000,"timescale":600,"epoch":0}"#);
    let back: MediaTime = serde_json::from_str(&s).unwrap();
    assert_eq!(back, t);
    assert_eq!(back.seconds(), 5.0);
}

#[test]
fn seconds_shape_converts_at_6000() {
    let t: MediaTime = serde_json::from_str(r#"{"time": 0.0333334}"#).unwrap();
    assert_eq!(t.value, 200);
    assert_eq!(t.timescale, PREFERRED_TIMESCALE);
    assert!(t.is_valid());
}

#[test]
fn missing_flags_default_to_valid() {
    let t: MediaTime = serde_json::from_str(r#"{"value": 25, "timescale": 600}"#).unwrap();
    assert_eq!(t.flags, MediaTime::FLAG_VALID);
    assert_eq!(t.epoch, 0);
}

#[test]
fn cmp_time_ignores_timescale() {
    let a = MediaTime::new(1, 24);
    let b = MediaTime::new(3750, 90000);
    assert_eq!(a.cmp_time(&b), Ordering::Equal);
    assert_eq!(MediaTime::new(1, 2).cmp_time(&a), Ordering::Greater);
    assert_eq!(MediaTime::invalid().cmp_time(&a), Ordering::Less);
}

#[test]
fn add_uses_common_timescale() {
    let a = MediaTime::new(1, 600);
    let b = MediaTime::new(1, 90000);
    let c = a.add(&b);
    assert_eq!(c.timescale, 90000);
    assert_eq!(c.value, 151);
    assert_eq!(c.sub(&b).cmp_time(&a), Ordering::Equal);
}

#[test]
fn convert_scale_marks_rounding() {
    let t = MediaTime::new(1, 3).convert_scale(600);
    assert_eq!(t.value, 200);
    assert_eq!(t.flags & MediaTime::FLAG_HAS_BEEN_ROUNDED, 0);
    let r = MediaTime::new(1, 7).convert_scale(600);
    assert_eq!(r.value, 86);
    assert_ne!(r.flags & MediaTime::FLAG_HAS_BEEN_ROUNDED, 0);
}

#[test]
fn range_contains_is_half_open() {
    let r = TimeRange::new(MediaTime::new(600, 600), MediaTime::new(1200, 600));
    assert!(r.contains(&MediaTime::new(1, 1)));
    assert!(r.contains(&MediaTime::new(2999, 1000)));
    assert!(!r.contains(&MediaTime::new(3, 1)));
    assert!(!r.contains(&MediaTime::new(0, 1)));
    assert!(!r.is_empty());
    assert!(TimeRange::invalid().is_empty());
}

#[test]
fn range_json_has_nested_times() {
    let r = TimeRange::new(MediaTime::new(0, 600), MediaTime::new(6000, 600));
    assert_eq!(
        r.to_json_string(),
        r#"{"start":{"flags":1,"value":0,"timescale":600,"epoch":0},"duration":{"flags":1,"value":6000,"timescale":600,"epoch":0}}"#
    );
}

#[test]
fn zero_matches_empty_composition_duration() {
    assert_eq!(
        MediaTime::zero().to_json_string(),
        r#"{"flags":1,"value":0,"timescale":1,"epoch":0}"#
    );
}

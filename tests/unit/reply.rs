use super::*;

#[test]
fn accessors_never_panic_on_absent_values() {
    let r = Reply::ok();
    assert!(r.is_ok());
    assert_eq!(r.string_value(), None);
    assert_eq!(r.number_value(), None);
    assert!(r.dictionary_value().is_none());
}

#[test]
fn numbers_carry_their_text() {
    let r = Reply::number(0.0);
    assert_eq!(r.string_value(), Some("0"));
    assert_eq!(r.number_value(), Some(0.0));
    assert_eq!(Reply::number(2.5).string_value(), Some("2.5"));
}

#[test]
fn booleans_reply_yes_no() {
    assert_eq!(Reply::boolean(true).string_value(), Some("YES"));
    assert_eq!(Reply::boolean(false).number_value(), Some(0.0));
}

#[test]
fn errors_keep_code_and_diagnostic() {
    let r: Reply = MovingImagesError::invalid_receiver("no object 7").into();
    assert_eq!(r.code(), ErrorCode::InvalidReceiverObject);
    assert_eq!(r.code().as_u32(), 246);
    assert!(r.string_value().unwrap().contains("no object 7"));
}

#[test]
fn codes_round_trip_through_u32() {
    for v in [0u32, 240, 241, 242, 243, 244, 245, 246, 247] {
        assert_eq!(ErrorCode::from_u32(v).unwrap().as_u32(), v);
    }
    assert!(ErrorCode::from_u32(1).is_none());
}

#[test]
fn to_json_omits_absent_values() {
    let v = Reply::boolean(true).to_json();
    assert_eq!(v["error"], 0);
    assert_eq!(v["stringvalue"], "YES");
    assert_eq!(v["numericvalue"], 1.0);
    assert!(v.get("dictionaryvalue").is_none());
}

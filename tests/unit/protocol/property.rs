use super::*;

#[test]
fn data_type_names() {
    assert_eq!(DataType::parse(None).unwrap(), DataType::JsonString);
    assert_eq!(
        DataType::parse(Some("dictionaryobject")).unwrap(),
        DataType::DictionaryObject
    );
    assert!(DataType::parse(Some("xml")).is_err());
}

#[test]
fn time_reply_carries_seconds() {
    let t = MediaTime::new(3000, 600);
    let r = PropertyValue::Time(t).into_reply(DataType::JsonString);
    assert_eq!(r.number_value(), Some(5.0));
    let parsed: MediaTime = serde_json::from_str(r.string_value().unwrap()).unwrap();
    assert_eq!(parsed, t);

    let d = PropertyValue::Time(t).into_reply(DataType::DictionaryObject);
    assert_eq!(d.dictionary_value().unwrap()["timescale"], json!(600));
    assert_eq!(d.number_value(), Some(5.0));
}

#[test]
fn scalars_and_booleans() {
    assert_eq!(
        PropertyValue::Bool(true)
            .into_reply(DataType::JsonString)
            .string_value(),
        Some("YES")
    );
    let n = PropertyValue::int(7).into_reply(DataType::JsonString);
    assert_eq!(n.number_value(), Some(7.0));
    assert_eq!(n.string_value(), Some("7"));
    assert_eq!(PropertyValue::Bool(false).to_json(), json!(false));
    assert_eq!(number_json(2.0), json!(2));
    assert_eq!(number_json(2.5), json!(2.5));
}

#[test]
fn size_and_transform_shapes() {
    let s = PropertyValue::Size(Size::new(640.0, 480.0)).to_json();
    assert_eq!(s, json!({"width": 640, "height": 480}));
    let a = PropertyValue::Transform(Affine::translate((1.5, 2.0))).to_json();
    assert_eq!(a["tX"], json!(1.5));
    assert_eq!(a["m22"], json!(1));
    assert_eq!(
        a.to_string(),
        r#"{"m11":1,"m12":0,"m21":0,"m22":1,"tX":1.5,"tY":2}"#
    );
}

#[test]
fn dictionaries_always_carry_the_map() {
    let mut m = Map::new();
    m.insert("a".to_owned(), json!(1));
    let r = PropertyValue::Dict(m).into_reply(DataType::JsonString);
    assert_eq!(r.dictionary_value().unwrap()["a"], json!(1));
    assert_eq!(r.string_value(), Some(r#"{"a":1}"#));
}

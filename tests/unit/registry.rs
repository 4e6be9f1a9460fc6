use super::*;

#[test]
fn references_are_monotonic_from_zero() {
    let mut reg = Registry::<u32>::default();
    assert_eq!(reg.create(ObjectType::BitmapContext, None, 1), 0);
    assert_eq!(reg.create(ObjectType::BitmapContext, None, 2), 1);
    reg.close(&Selector::ByReference(1)).unwrap();
    assert_eq!(reg.create(ObjectType::MovieEditor, None, 3), 2);
}

#[test]
fn create_close_round_trip_by_name() {
    let mut reg = Registry::<u32>::default();
    reg.create(ObjectType::MovieImporter, Some("a".into()), 7);
    assert_eq!(reg.count(Some(ObjectType::MovieImporter)), 1);
    let sel = Selector::ByTypeName(ObjectType::MovieImporter, "a".into());
    assert_eq!(reg.close(&sel).unwrap(), ObjectType::MovieImporter);
    assert_eq!(reg.count(Some(ObjectType::MovieImporter)), 0);
    assert_eq!(reg.count(None), 0);
}

#[test]
fn second_close_is_invalid_receiver() {
    let mut reg = Registry::<u32>::default();
    let r = reg.create(ObjectType::BitmapContext, None, 0);
    assert!(reg.close(&Selector::ByReference(r)).is_ok());
    let err = reg.close(&Selector::ByReference(r)).unwrap_err();
    assert!(matches!(err, MovingImagesError::InvalidReceiver(_)));
}

#[test]
fn duplicate_names_resolve_to_newest() {
    let mut reg = Registry::<u32>::default();
    reg.create(ObjectType::BitmapContext, Some("b".into()), 10);
    let newer = reg.create(ObjectType::BitmapContext, Some("b".into()), 20);
    let sel = Selector::ByTypeName(ObjectType::BitmapContext, "b".into());
    let found = reg.resolve(&sel).unwrap();
    assert_eq!(found.reference, newer);
    assert_eq!(*lock(&found.handle), 20);

    reg.close(&sel).unwrap();
    assert_eq!(*lock(&reg.resolve(&sel).unwrap().handle), 10);
}

#[test]
fn names_are_scoped_by_type() {
    let mut reg = Registry::<u32>::default();
    reg.create(ObjectType::BitmapContext, Some("x".into()), 1);
    let sel = Selector::ByTypeName(ObjectType::MovieEditor, "x".into());
    assert!(reg.resolve(&sel).is_err());
}

#[test]
fn close_all_filters_by_type() {
    let mut reg = Registry::<u32>::default();
    reg.create(ObjectType::BitmapContext, None, 1);
    reg.create(ObjectType::MovieEditor, None, 2);
    reg.create(ObjectType::MovieEditor, None, 3);
    assert_eq!(reg.close_all(Some(ObjectType::MovieEditor)), 2);
    assert_eq!(reg.count(None), 1);
    assert_eq!(reg.close_all(None), 1);
    assert_eq!(reg.count(None), 0);
}

#[test]
fn object_type_wire_names_parse() {
    for t in ObjectType::ALL {
        assert_eq!(t.as_str().parse::<ObjectType>().unwrap(), t);
    }
    assert!(matches!(
        "imagecollection".parse::<ObjectType>(),
        Err(MovingImagesError::InvalidObjectType(_))
    ));
}

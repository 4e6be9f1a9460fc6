use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        MovingImagesError::invalid_parameter("x")
            .to_string()
            .contains("invalid parameter:")
    );
    assert!(
        MovingImagesError::invalid_property("x")
            .to_string()
            .contains("invalid property:")
    );
    assert!(
        MovingImagesError::missing_variable("x")
            .to_string()
            .contains("missing variable:")
    );
    assert!(
        MovingImagesError::invalid_receiver("x")
            .to_string()
            .contains("invalid receiver object:")
    );
}

#[test]
fn other_preserves_source_and_maps_to_operation_failed() {
    let base = std::io::Error::other("boom");
    let err = MovingImagesError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
    assert_eq!(err.code(), ErrorCode::OperationFailed);
}

#[test]
fn every_class_has_its_own_code() {
    let codes = [
        MovingImagesError::invalid_command("x").code(),
        MovingImagesError::invalid_parameter("x").code(),
        MovingImagesError::invalid_property("x").code(),
        MovingImagesError::operation_failed("x").code(),
        MovingImagesError::missing_variable("x").code(),
        MovingImagesError::invalid_object_type("x").code(),
        MovingImagesError::invalid_receiver("x").code(),
        MovingImagesError::invalid_image_identifier("x").code(),
    ];
    let mut raw: Vec<u32> = codes.iter().map(|c| c.as_u32()).collect();
    raw.sort_unstable();
    raw.dedup();
    assert_eq!(raw.len(), codes.len());
    assert_eq!(
        MovingImagesError::invalid_receiver("x").code().as_u32(),
        246
    );
}

use super::*;

#[test]
fn color_quantizes_then_premultiplies() {
    let c = Color::new(0.8, 0.3, 0.1, 1.0);
    assert_eq!(c.to_rgba8(), [204, 77, 26, 255]);
    assert_eq!(c.to_premul().to_array(), [204, 77, 26, 255]);

    let half = Color::new(1.0, 0.5, 0.0, 0.5);
    assert_eq!(half.to_premul().to_array(), [128, 64, 0, 128]);
}

#[test]
fn color_alpha_defaults_to_opaque() {
    let c: Color = serde_json::from_str(
        r#"{"red":0.1,"green":0.2,"blue":0.3,"colorcolorprofilename":"kCGColorSpaceSRGB"}"#,
    )
    .unwrap();
    assert_eq!(c.alpha, 1.0);
}

#[test]
fn frame_checks_buffer_length() {
    assert!(FrameRGBA::from_premul(2, 2, vec![0; 16]).is_ok());
    assert!(FrameRGBA::from_premul(2, 2, vec![0; 15]).is_err());
}

#[test]
fn straight_round_trip_keeps_opaque_pixels() {
    let f = FrameRGBA::from_straight(1, 2, vec![10, 20, 30, 255, 200, 100, 50, 128]).unwrap();
    assert_eq!(f.pixel(0, 0), Some([10, 20, 30, 255]));
    assert_eq!(f.pixel(0, 1), Some([100, 50, 25, 128]));
    let straight = f.to_straight();
    assert_eq!(&straight[..4], &[10, 20, 30, 255]);
    assert_eq!(straight[7], 128);
    assert!(f.pixel(1, 0).is_none());
}

#[test]
fn affine_json_uses_tx_ty_names() {
    let a = Affine::translate((3.0, 4.0));
    let json = serde_json::to_string(&AffineJson::from(a)).unwrap();
    assert_eq!(
        json,
        r#"{"m11":1.0,"m12":0.0,"m21":0.0,"m22":1.0,"tX":3.0,"tY":4.0}"#
    );
}

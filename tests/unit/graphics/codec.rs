use super::*;

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("movingimages-codec-{}-{name}", std::process::id()))
}

#[test]
fn uti_lookup() {
    assert_eq!(ImageFileType::from_uti("public.jpeg").unwrap(), ImageFileType::Jpeg);
    assert!(matches!(
        ImageFileType::from_uti("public.heic"),
        Err(MovingImagesError::InvalidParameter(_))
    ));
    assert!(ImageFileType::list().starts_with("public.png public.jpeg"));
}

#[test]
fn png_keeps_premultiplied_pixels() {
    let frame = FrameRGBA::from_straight(2, 1, vec![100, 50, 200, 128, 0, 0, 0, 0]).unwrap();
    let path = temp_path("roundtrip.png");
    encode_image(&frame, &path, ImageFileType::Png, None).unwrap();
    let back = decode_image(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(back, frame);
}

#[test]
fn jpeg_drops_alpha() {
    let frame = FrameRGBA::from_straight(8, 8, [200u8, 10, 10, 255].repeat(64)).unwrap();
    let path = temp_path("opaque.jpg");
    encode_image(&frame, &path, ImageFileType::Jpeg, Some(0.9)).unwrap();
    let back = decode_image(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!((back.width, back.height), (8, 8));
    assert_eq!(back.pixel(4, 4).unwrap()[3], 255);
}

#[test]
fn missing_file_is_operation_failed() {
    let err = decode_image(&temp_path("does-not-exist.png")).unwrap_err();
    assert!(matches!(err, MovingImagesError::OperationFailed(_)));
}

#[test]
fn resize_constant_image() {
    let frame = FrameRGBA::from_premul(2, 2, [10u8, 20, 30, 255].repeat(4)).unwrap();
    let big = resize(&frame, 4, 3).unwrap();
    assert_eq!((big.width, big.height), (4, 3));
    assert!(big.data.chunks_exact(4).all(|px| px == [10, 20, 30, 255]));
}

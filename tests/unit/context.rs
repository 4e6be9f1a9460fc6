use super::*;
use crate::graphics::bitmap::BitmapPreset;
use crate::media::backend::UnavailableBackend;
use crate::media::importer::FrameTime;

fn context() -> Context {
    Context::with_backend(Arc::new(UnavailableBackend))
}

fn add_bitmap(ctx: &mut Context, name: &str) -> u64 {
    let bitmap = BitmapContext::new(4, 2, BitmapPreset::AlphaPreMulFirstRgb, 16).unwrap();
    ctx.objects
        .create(ObjectType::BitmapContext, Some(name.to_owned()), Object::Bitmap(bitmap))
}

fn current() -> FrameGrab {
    FrameGrab {
        time: FrameTime::Current,
        tracks: Vec::new(),
    }
}

#[test]
fn config_defaults_and_partial_json() {
    let config = ContextConfig::from_json_str(r#"{"max_draw_depth": 4}"#).unwrap();
    assert_eq!(config.max_draw_depth, 4);
    assert_eq!(config.max_bitmap_dimension, 16_384);
    assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
}

#[test]
fn config_must_be_an_object() {
    for text in ["[1]", "[32, \"ffmpeg\"]", "7", "null"] {
        assert!(
            matches!(
                ContextConfig::from_json_str(text),
                Err(MovingImagesError::InvalidParameter(_))
            ),
            "{text}"
        );
    }
}

#[test]
fn missing_config_file_names_the_path() {
    let err = ContextConfig::load(Path::new("/nonexistent/movingimages.json")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/movingimages.json"));
}

#[test]
fn bitmap_snapshot_becomes_an_image() {
    let mut ctx = context();
    let reference = add_bitmap(&mut ctx, "canvas");
    let frame = ctx
        .image_from_object(&Selector::ByReference(reference), &current())
        .unwrap();
    assert_eq!((frame.width, frame.height), (4, 2));
    assert!(matches!(
        ctx.image_from_object(&Selector::ByReference(reference + 1), &current()),
        Err(MovingImagesError::InvalidReceiver(_))
    ));
}

#[test]
fn collection_lookup_and_reset() {
    let mut ctx = context();
    add_bitmap(&mut ctx, "a");
    add_bitmap(&mut ctx, "b");
    ctx.images.insert("frame".into(), Arc::new(FrameRGBA::new(1, 1).unwrap()));
    ctx.variables_mut().set("x", serde_json::json!(3));

    assert_eq!(ctx.object_count(None), 2);
    assert_eq!(ctx.object_count(Some(ObjectType::MovieEditor)), 0);
    assert!(ctx.collection_image("frame").is_ok());
    assert!(matches!(
        ctx.collection_image("other"),
        Err(MovingImagesError::InvalidImageIdentifier(_))
    ));

    ctx.reset();
    assert_eq!(ctx.object_count(None), 0);
    assert_eq!(ctx.image_count(), 0);
    assert!(ctx.variables().is_empty());
}

#[test]
fn local_context_shares_config_but_not_objects() {
    let config = ContextConfig {
        max_draw_depth: 3,
        ..ContextConfig::default()
    };
    let mut ctx = Context::with_backend_and_config(Arc::new(UnavailableBackend), config);
    add_bitmap(&mut ctx, "a");
    let local = ctx.local();
    assert_eq!(local.config().max_draw_depth, 3);
    assert_eq!(local.object_count(None), 0);
    assert!(format!("{local:?}").contains("unavailable"));
}

#[test]
fn default_context_is_shared() {
    let a = default_context();
    let b = default_context();
    assert!(Arc::ptr_eq(a, b));
}

use std::path::Path;

use serde_json::json;

use super::*;
use crate::foundation::core::Size;
use crate::media::backend::{MediaBackend, MovieInfo, MovieSinkSpec, MovieSource, TrackInfo};
use crate::media::sink::{FrameSink, InMemorySink};
use crate::reply::ErrorCode;

struct Clip {
    info: MovieInfo,
}

impl MovieSource for Clip {
    fn info(&self) -> &MovieInfo {
        &self.info
    }

    fn frame_at(&mut self, _track_id: u32, time: MediaTime) -> MovingImagesResult<FrameRGBA> {
        let shade = (time.value / 3750) as u8 * 10;
        FrameRGBA::from_premul(2, 2, [shade, 0, 0, 255].repeat(4))
    }
}

/// Opens every path as a ten second 2x2 clip and records whatever gets written.
struct Studio {
    sink: InMemorySink,
}

impl MediaBackend for Studio {
    fn name(&self) -> &'static str {
        "studio"
    }

    fn open_movie(&self, _path: &Path) -> MovingImagesResult<Box<dyn MovieSource>> {
        let duration = MediaTime::new(900_000, 90_000);
        let track = TrackInfo::video(1, Size::new(2.0, 2.0), duration, MediaTime::new(3750, 90_000));
        Ok(Box::new(Clip {
            info: MovieInfo {
                duration,
                tracks: vec![track],
                metadata: Vec::new(),
            },
        }))
    }

    fn create_sink(&self, _spec: &MovieSinkSpec) -> MovingImagesResult<Box<dyn FrameSink>> {
        Ok(Box::new(self.sink.clone()))
    }
}

fn studio() -> (Context, InMemorySink) {
    let sink = InMemorySink::new();
    let ctx = Context::with_backend(Arc::new(Studio { sink: sink.clone() }));
    (ctx, sink)
}

fn named(kind: &str, name: &str) -> Value {
    json!({"objecttype": kind, "objectname": name})
}

fn create_bitmap(ctx: &mut Context, name: &str, width: u32, height: u32, preset: &str) -> Reply {
    execute(
        ctx,
        &json!({
            "command": "create",
            "objecttype": "bitmapcontext",
            "objectname": name,
            "size": {"width": width, "height": height},
            "preset": preset
        }),
    )
}

#[test]
fn create_then_close_twice() {
    let (mut ctx, _) = studio();
    let created = create_bitmap(&mut ctx, "canvas", 4, 4, "AlphaPreMulFirstRGB8bpcInt");
    assert!(created.is_ok());
    assert_eq!(created.number_value(), Some(0.0));
    assert_eq!(created.string_value(), Some("0"));

    let close = json!({"command": "close", "receiverobject": named("bitmapcontext", "canvas")});
    assert!(execute(&mut ctx, &close).is_ok());
    assert_eq!(execute(&mut ctx, &close).code(), ErrorCode::InvalidReceiverObject);
    assert_eq!(ctx.object_count(None), 0);
}

#[test]
fn name_and_reference_select_the_same_object() {
    let (mut ctx, _) = studio();
    create_bitmap(&mut ctx, "canvas", 7, 3, "AlphaPreMulFirstRGB8bpcInt");
    let by_name = execute(
        &mut ctx,
        &json!({
            "command": "getproperty",
            "receiverobject": named("bitmapcontext", "canvas"),
            "propertykey": "width"
        }),
    );
    let by_reference = execute(
        &mut ctx,
        &json!({
            "command": "getproperty",
            "receiverobject": {"objectreference": 0},
            "propertykey": "width"
        }),
    );
    assert_eq!(by_name, by_reference);
    assert_eq!(by_name.number_value(), Some(7.0));
}

#[test]
fn filled_pixel_reads_back_in_bgra_order() {
    let (mut ctx, _) = studio();
    create_bitmap(&mut ctx, "strip", 400, 1, "AlphaPreMulBGRA8bpc32bppInteger");
    let receiver = named("bitmapcontext", "strip");
    let fill = json!({
        "command": "drawelement",
        "receiverobject": receiver,
        "drawinstructions": {
            "elementtype": "fillrectangle",
            "rect": {"origin": {"x": 0, "y": 0}, "size": {"width": 1, "height": 1}},
            "fillcolor": {"red": 0.8, "green": 0.3, "blue": 0.1, "alpha": 1.0}
        }
    });
    assert!(execute(&mut ctx, &fill).is_ok());

    let reply = execute(
        &mut ctx,
        &json!({
            "command": "getpixeldata",
            "receiverobject": receiver,
            "propertyvalue": {"origin": {"x": 0, "y": 0}, "size": {"width": 1, "height": 1}}
        }),
    );
    let dict = reply.dictionary_value().unwrap();
    assert_eq!(dict["pixeldata"], json!([[0, 0, 26, 77, 204, 255]]));
    let text: Value = serde_json::from_str(reply.string_value().unwrap()).unwrap();
    assert_eq!(&text["pixeldata"], &dict["pixeldata"]);
}

#[test]
fn verbs_check_the_receiver_kind() {
    let (mut ctx, _) = studio();
    create_bitmap(&mut ctx, "canvas", 4, 4, "AlphaPreMulFirstRGB8bpcInt");
    let receiver = named("bitmapcontext", "canvas");

    let reply = execute(&mut ctx, &json!({"command": "createtrack", "receiverobject": receiver}));
    assert_eq!(reply.code(), ErrorCode::InvalidReceiverObject);
    assert_eq!(
        reply.string_value(),
        Some("invalid receiver object: 'createtrack' cannot be sent to a bitmapcontext")
    );

    let reply = execute(
        &mut ctx,
        &json!({
            "command": "setproperty",
            "receiverobject": receiver,
            "propertykey": "naturalsize",
            "propertyvalue": {"width": 2, "height": 2}
        }),
    );
    assert_eq!(reply.code(), ErrorCode::InvalidProperty);
}

#[test]
fn malformed_commands() {
    let (mut ctx, _) = studio();
    assert_eq!(execute(&mut ctx, &json!([1, 2])).code(), ErrorCode::InvalidCommand);
    assert_eq!(execute(&mut ctx, &json!({"command": "explode"})).code(), ErrorCode::InvalidCommand);
    assert_eq!(
        execute(&mut ctx, &json!({"command": "create", "objecttype": "teapot"})).code(),
        ErrorCode::InvalidObjectType
    );
    let unbound = json!({
        "command": "create",
        "objecttype": "movieimporter",
        "pathsubstitution": "moviefile"
    });
    assert_eq!(execute(&mut ctx, &unbound).code(), ErrorCode::MissingVariable);
    ctx.variables_mut().set("moviefile", json!("/movies/clip.mov"));
    assert!(execute(&mut ctx, &unbound).is_ok());
}

#[test]
fn runaway_equation_is_an_invalid_parameter() {
    let (mut ctx, _) = studio();
    let width = format!("{}1{}", "(".repeat(1000), ")".repeat(1000));
    let reply = execute(
        &mut ctx,
        &json!({"command": "create", "objecttype": "bitmapcontext", "size": {"width": width, "height": 1}}),
    );
    assert_eq!(reply.code(), ErrorCode::InvalidParameter);
    assert_eq!(ctx.object_count(None), 0);
}

#[test]
fn global_properties() {
    let (mut ctx, _) = studio();
    create_bitmap(&mut ctx, "a", 2, 2, "AlphaPreMulFirstRGB8bpcInt");
    execute(&mut ctx, &json!({"command": "create", "objecttype": "movieeditor"}));

    let count = |ctx: &mut Context, extra: Value| {
        let mut command = json!({"command": "getproperty", "propertykey": "numberofobjects"});
        if let (Value::Object(c), Value::Object(e)) = (&mut command, extra) {
            c.extend(e);
        }
        execute(ctx, &command).number_value()
    };
    assert_eq!(count(&mut ctx, json!({})), Some(2.0));
    assert_eq!(count(&mut ctx, json!({"objecttype": "movieeditor"})), Some(1.0));

    let version = execute(&mut ctx, &json!({"command": "getproperty", "propertykey": "version"}));
    assert_eq!(version.string_value(), Some(crate::VERSION));
    let presets = execute(
        &mut ctx,
        &json!({"command": "getproperty", "propertykey": "videowriterpresets"}),
    );
    assert!(presets.string_value().unwrap().contains("prores4444preset"));
    let bitmap_presets = execute(
        &mut ctx,
        &json!({"command": "getproperty", "propertykey": "bitmapcontextpresets"}),
    );
    assert!(bitmap_presets.string_value().unwrap().contains("AlphaPreMulBGRA8bpc32bppInteger"));
    let unknown = execute(&mut ctx, &json!({"command": "getproperty", "propertykey": "colour"}));
    assert_eq!(unknown.code(), ErrorCode::InvalidProperty);
}

#[test]
fn image_collection_from_a_bitmap() {
    let (mut ctx, _) = studio();
    create_bitmap(&mut ctx, "canvas", 3, 3, "AlphaPreMulFirstRGB8bpcInt");
    let assign = json!({
        "command": "assignimagetocollection",
        "receiverobject": named("bitmapcontext", "canvas"),
        "imageidentifier": "still"
    });
    assert!(execute(&mut ctx, &assign).is_ok());
    assert_eq!(ctx.image_count(), 1);

    let remove = json!({"command": "removeimagefromcollection", "imageidentifier": "still"});
    assert!(execute(&mut ctx, &remove).is_ok());
    assert_eq!(execute(&mut ctx, &remove).code(), ErrorCode::InvalidImageIdentifier);
}

#[test]
fn editor_export_rejects_an_empty_segment() {
    let (mut ctx, sink) = studio();
    execute(&mut ctx, &json!({"command": "create", "objecttype": "movieeditor", "objectname": "cut"}));
    let receiver = named("movieeditor", "cut");
    let track = execute(&mut ctx, &json!({"command": "createtrack", "receiverobject": receiver}));
    assert_eq!(track.number_value(), Some(1.0));
    let gap = json!({
        "command": "insertemptytracksegment",
        "receiverobject": receiver,
        "track": {"trackid": 1},
        "timerange": {
            "start": {"value": 0, "timescale": 600},
            "duration": {"value": 600, "timescale": 600}
        }
    });
    assert!(execute(&mut ctx, &gap).is_ok());
    let export = json!({
        "command": "export",
        "receiverobject": receiver,
        "file": "/movies/cut.mp4",
        "utifiletype": "public.mpeg-4",
        "exportpreset": "AVAssetExportPresetHighestQuality"
    });
    assert_eq!(execute(&mut ctx, &export).code(), ErrorCode::OperationFailed);
    assert_eq!(sink.recording().config, None);
}

#[test]
fn processframes_feeds_a_writer() {
    let (mut ctx, sink) = studio();
    execute(
        &mut ctx,
        &json!({"command": "create", "objecttype": "movieimporter", "objectname": "clip", "file": "/movies/clip.mov"}),
    );
    execute(
        &mut ctx,
        &json!({
            "command": "create",
            "objecttype": "videoframeswriter",
            "objectname": "out",
            "file": "/movies/out.mov",
            "utifiletype": "com.apple.quicktime-movie"
        }),
    );
    let writer = named("videoframeswriter", "out");
    let input = json!({
        "command": "addinputtowriter",
        "receiverobject": writer,
        "preset": "h264preset_sd",
        "size": {"width": 2, "height": 2},
        "frameduration": {"value": 3750, "timescale": 90_000}
    });
    assert!(execute(&mut ctx, &input).is_ok());

    let sample = json!({
        "command": "addimagesampletowriter",
        "receiverobject": writer,
        "imageidentifier": "frame",
        "lastaccessedframedurationkey": "duration"
    });
    let process = json!({
        "command": "processframes",
        "receiverobject": named("movieimporter", "clip"),
        "imageidentifier": "frame",
        "lastaccessedframedurationkey": "duration",
        "tracks": [{"trackid": 1}],
        "processinstructions": [
            {"frametime": {"value": 0, "timescale": 90_000}, "commands": [sample]},
            {"commands": [sample]}
        ],
        "cleanupcommands": [
            {"command": "finishwritingframes", "receiverobject": writer}
        ]
    });
    let reply = execute(&mut ctx, &process);
    assert!(reply.is_ok(), "{reply:?}");

    let recording = sink.recording();
    assert!(recording.finished);
    assert_eq!(recording.frames.len(), 2);
    assert_eq!(recording.frames[1].0.cmp_time(&MediaTime::new(3750, 90_000)), std::cmp::Ordering::Equal);
    assert_eq!(recording.frames[1].1.data[0], 10);
}

#[test]
fn processframes_needs_an_importer() {
    let (mut ctx, _) = studio();
    create_bitmap(&mut ctx, "canvas", 2, 2, "AlphaPreMulFirstRGB8bpcInt");
    let reply = execute(
        &mut ctx,
        &json!({
            "command": "processframes",
            "receiverobject": named("bitmapcontext", "canvas"),
            "imageidentifier": "frame",
            "processinstructions": []
        }),
    );
    assert_eq!(reply.code(), ErrorCode::InvalidReceiverObject);
}

use std::path::Path;

use super::*;
use crate::media::backend::MovieSource;
use crate::media::sink::InMemorySink;

struct Recorder(InMemorySink);

impl MediaBackend for Recorder {
    fn name(&self) -> &'static str {
        "recorder"
    }

    fn open_movie(&self, path: &Path) -> MovingImagesResult<Box<dyn MovieSource>> {
        Err(MovingImagesError::operation_failed(format!("cannot open {}", path.display())))
    }

    fn create_sink(&self, _spec: &MovieSinkSpec) -> MovingImagesResult<Box<dyn FrameSink>> {
        Ok(Box::new(self.0.clone()))
    }
}

fn input(preset: WriterPreset, width: u32, height: u32, frame_duration: MediaTime) -> WriterInput {
    WriterInput {
        preset,
        width,
        height,
        frame_duration,
    }
}

fn writer() -> VideoFramesWriter {
    VideoFramesWriter::new("/movies/videowriter.mov", MovieFileType::QuickTime)
}

#[test]
fn properties_before_input() {
    let w = writer();
    assert_eq!(
        Value::Object(w.properties("w")),
        json!({
            "file": "/movies/videowriter.mov",
            "objectname": "w",
            "objecttype": "videoframeswriter",
            "utifiletype": "com.apple.quicktime-movie",
            "videowriterstatus": 0,
            "canwriteframes": false
        })
    );
    assert!(matches!(w.property("size"), Err(MovingImagesError::InvalidProperty(_))));
}

#[test]
fn prores4444_properties_string() {
    let mut w = writer();
    let duration = MediaTime::from_seconds(0.0333334, PREFERRED_TIMESCALE);
    w.add_input(input(WriterPreset::ProRes4444, 1782, 1080, duration)).unwrap();
    assert_eq!(
        Value::Object(w.properties("test001.movievideoframeswriter")).to_string(),
        concat!(
            r#"{"objectname":"test001.movievideoframeswriter","objecttype":"videoframeswriter","#,
            r#""videosettings":{"AVVideoColorPropertiesKey":{"TransferFunction":"ITU_R_709_2","#,
            r#""YCbCrMatrix":"ITU_R_709_2","ColorPrimaries":"ITU_R_709_2"},"AVVideoCodecKey":"ap4h","#,
            r#""AVVideoHeightKey":1080,"AVVideoWidthKey":1782,"AVVideoScalingModeKey":"#,
            r#""AVVideoScalingModeResizeAspect"},"frameduration":{"flags":1,"value":200,"#,
            r#""timescale":6000,"epoch":0},"canwriteframes":true,"file":"/movies/videowriter.mov","#,
            r#""time":{"flags":1,"value":0,"timescale":6000,"epoch":0},"#,
            r#""size":{"width":1782,"height":1080},"videowriterstatus":0,"#,
            r#""utifiletype":"com.apple.quicktime-movie"}"#
        )
    );
}

#[test]
fn h264_settings_report_frame_rate() {
    let mut w = writer();
    w.add_input(input(WriterPreset::H264Hd, 1280, 720, MediaTime::new(1001, 30000)))
        .unwrap();
    let PropertyValue::Dict(settings) = w.property("videosettings").unwrap() else {
        panic!("videosettings is a dictionary");
    };
    let compression = &settings["AVVideoCompressionPropertiesKey"];
    assert_eq!(compression["ExpectedFrameRate"], json!(30));
    assert_eq!(compression["AverageBitRate"], json!(15_585_760));
    assert_eq!(compression["H264EntropyMode"], json!("CABAC"));
    assert!(
        w.add_input(input(WriterPreset::Jpeg, 10, 10, MediaTime::new(1, 30)))
            .is_err()
    );
}

#[test]
fn samples_follow_frame_duration_and_overrides() {
    let sink = InMemorySink::new();
    let backend = Recorder(sink.clone());
    let mut w = writer();
    w.add_input(input(WriterPreset::H264Sd, 4, 2, MediaTime::new(200, 6000)))
        .unwrap();
    let frame = FrameRGBA::from_premul(2, 1, [10u8, 20, 30, 255].repeat(2)).unwrap();
    w.add_sample(&backend, &frame, None, None).unwrap();
    assert_eq!(w.status, WriterStatus::Writing);
    w.add_sample(&backend, &frame, None, Some(MediaTime::new(3750, 90000)))
        .unwrap();
    w.add_sample(&backend, &frame, None, None).unwrap();
    assert!(w.add_sample(&backend, &frame, Some(MediaTime::zero()), None).is_err());
    w.finish().unwrap();
    let rec = sink.recording();
    let times: Vec<f64> = rec.frames.iter().map(|(t, _)| t.seconds()).collect();
    assert_eq!(times.len(), 3);
    assert!((times[1] - 200.0 / 6000.0).abs() < 1e-9);
    assert!((times[2] - (200.0 / 6000.0 + 3750.0 / 90000.0)).abs() < 1e-9);
    assert_eq!((rec.frames[0].1.width, rec.frames[0].1.height), (4, 2));
    assert_eq!(rec.config.unwrap().bit_rate, Some(3_145_728));
    assert_eq!(w.status, WriterStatus::Completed);
    assert_eq!(w.property("canwriteframes").unwrap(), PropertyValue::Bool(false));
}

#[test]
fn finish_without_frames_fails_and_cancel_marks_status() {
    let mut w = writer();
    w.add_input(input(WriterPreset::ProRes422, 8, 8, MediaTime::new(1, 30)))
        .unwrap();
    assert!(matches!(w.finish(), Err(MovingImagesError::OperationFailed(_))));
    assert_eq!(w.status, WriterStatus::Failed);

    let sink = InMemorySink::new();
    let backend = Recorder(sink.clone());
    let mut w = writer();
    w.add_input(input(WriterPreset::ProRes422, 8, 8, MediaTime::new(1, 30)))
        .unwrap();
    w.add_sample(&backend, &FrameRGBA::new(8, 8).unwrap(), None, None)
        .unwrap();
    w.cancel();
    assert!(sink.recording().cancelled);
    assert_eq!(w.property("videowriterstatus").unwrap(), PropertyValue::int(4));
}

use super::*;

fn config() -> SinkConfig {
    SinkConfig {
        width: 2,
        height: 2,
        frame_duration: MediaTime::new(1001, 30000),
        codec: VideoCodec::H264,
        bit_rate: None,
    }
}

#[test]
fn records_frames_across_clones() {
    let sink = InMemorySink::new();
    let mut writer = sink.clone();
    writer.begin(&config()).unwrap();
    writer
        .push_frame(MediaTime::zero(), &FrameRGBA::new(2, 2).unwrap())
        .unwrap();
    writer.end().unwrap();
    let rec = sink.recording();
    assert_eq!(rec.frames.len(), 1);
    assert!(rec.finished);
    assert_eq!(rec.config.unwrap().rate(), (30000, 1001));
}

#[test]
fn rejects_wrong_size_and_unstarted_pushes() {
    let mut sink = InMemorySink::new();
    let frame = FrameRGBA::new(4, 4).unwrap();
    assert!(sink.push_frame(MediaTime::zero(), &frame).is_err());
    sink.begin(&config()).unwrap();
    assert!(matches!(
        sink.push_frame(MediaTime::zero(), &frame),
        Err(MovingImagesError::InvalidParameter(_))
    ));
}

#[test]
fn validate_rejects_zero_duration() {
    let mut cfg = config();
    cfg.frame_duration = MediaTime::new(0, 600);
    assert!(cfg.validate().is_err());
    assert!(VideoCodec::ProRes4444.keeps_alpha());
    assert_eq!(VideoCodec::H264.fourcc(), "avc1");
}

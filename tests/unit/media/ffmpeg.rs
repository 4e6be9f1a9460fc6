use super::*;

const PROBE: &str = r#"{
  "streams": [
    {"index": 0, "id": "0x1", "codec_type": "audio", "time_base": "1/44100",
     "start_pts": 0, "duration_ts": 441000, "tags": {"language": "eng"}},
    {"index": 1, "id": "0x2", "codec_type": "video", "width": 576, "height": 360,
     "r_frame_rate": "24/1", "avg_frame_rate": "24/1", "time_base": "1/90000",
     "start_pts": 0, "duration_ts": 900000, "has_b_frames": 0,
     "tags": {"language": "eng"}}
  ],
  "format": {"duration": "10.000000",
             "tags": {"major_brand": "qt  ", "com.apple.quicktime.author": "me", "encoder": "x"}}
}"#;

#[test]
fn probe_maps_streams_to_tracks() {
    let (info, streams) = parse_probe(PROBE.as_bytes()).unwrap();
    assert_eq!(streams, vec![0, 1]);
    assert_eq!(info.duration.to_json_string(), r#"{"flags":1,"value":6000,"timescale":600,"epoch":0}"#);
    let video = &info.tracks[1];
    assert_eq!(video.track_id, 2);
    assert_eq!(video.media_type, "vide");
    assert_eq!(video.min_frame_duration, MediaTime::new(3750, 90000));
    assert_eq!(video.frame_rate, 24.0);
    assert_eq!(video.natural_size, Size::new(576.0, 360.0));
    let audio = &info.tracks[0];
    assert_eq!(audio.natural_size, Size::ZERO);
    assert_eq!(audio.preferred_volume, 1.0);
    assert!(!audio.min_frame_duration.is_valid());
}

#[test]
fn probe_metadata_formats() {
    let (info, _) = parse_probe(PROBE.as_bytes()).unwrap();
    assert_eq!(info.metadata.len(), 2);
    assert_eq!(
        info.metadata_formats(),
        vec!["com.apple.quicktime.mdta", "com.apple.quicktime.udta"]
    );
}

#[test]
fn rotated_tracks_stay_in_positive_quadrant() {
    let t = rotation_transform(-90.0, Size::new(40.0, 20.0));
    let bbox = t.transform_rect_bbox(Rect::new(0.0, 0.0, 40.0, 20.0));
    assert!(bbox.x0.abs() < 1e-9 && bbox.y0.abs() < 1e-9);
    assert!((bbox.width() - 20.0).abs() < 1e-9);
}

#[test]
fn h264_args_carry_bit_rate() {
    let cfg = SinkConfig {
        width: 2,
        height: 2,
        frame_duration: MediaTime::new(1, 30),
        codec: VideoCodec::H264,
        bit_rate: Some(3_145_728),
    };
    let args = codec_args(&cfg);
    assert!(args.windows(2).any(|w| w == ["-b:v", "3145728"]));
    assert_eq!(container(MovieFileType::QuickTime), "mov");
}

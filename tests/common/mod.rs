#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use movingimages::{
    Context, FrameRGBA, FrameSink, InMemorySink, MediaBackend, MediaTime, MovieInfo,
    MovieSinkSpec, MovieSource, MovingImagesError, MovingImagesResult, Size, TrackInfo,
};

pub const CLIP_TIMESCALE: i32 = 90_000;
pub const CLIP_FRAME: i64 = 3_000;

/// A one second, 30 fps clip. Red encodes the frame index, green is constant.
pub struct Clip {
    info: MovieInfo,
    width: u32,
    height: u32,
}

impl Clip {
    pub fn new(width: u32, height: u32) -> Self {
        let duration = MediaTime::new(i64::from(CLIP_TIMESCALE), CLIP_TIMESCALE);
        let track = TrackInfo::video(
            1,
            Size::new(f64::from(width), f64::from(height)),
            duration,
            MediaTime::new(CLIP_FRAME, CLIP_TIMESCALE),
        );
        Self {
            info: MovieInfo {
                duration,
                tracks: vec![track],
                metadata: Vec::new(),
            },
            width,
            height,
        }
    }
}

impl MovieSource for Clip {
    fn info(&self) -> &MovieInfo {
        &self.info
    }

    fn frame_at(&mut self, _track_id: u32, time: MediaTime) -> MovingImagesResult<FrameRGBA> {
        let index = time.convert_scale(CLIP_TIMESCALE).value / CLIP_FRAME;
        let px = [index as u8, 128, 0, 255];
        FrameRGBA::from_premul(self.width, self.height, px.repeat((self.width * self.height) as usize))
    }
}

/// Opens `*.mov` paths as [`Clip`]s and records every encoded frame in one shared sink.
pub struct FakeStudio {
    pub sink: InMemorySink,
    pub width: u32,
    pub height: u32,
}

impl MediaBackend for FakeStudio {
    fn name(&self) -> &'static str {
        "fake-studio"
    }

    fn open_movie(&self, path: &Path) -> MovingImagesResult<Box<dyn MovieSource>> {
        if path.extension().is_some_and(|e| e == "mov") {
            Ok(Box::new(Clip::new(self.width, self.height)))
        } else {
            Err(MovingImagesError::operation_failed(format!("cannot open {}", path.display())))
        }
    }

    fn create_sink(&self, _spec: &MovieSinkSpec) -> MovingImagesResult<Box<dyn FrameSink>> {
        Ok(Box::new(self.sink.clone()))
    }
}

pub fn studio(width: u32, height: u32) -> (Context, InMemorySink) {
    let sink = InMemorySink::new();
    let backend = FakeStudio {
        sink: sink.clone(),
        width,
        height,
    };
    (Context::with_backend(Arc::new(backend)), sink)
}

pub fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::path::PathBuf::from("target").join("movingimages-tests").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

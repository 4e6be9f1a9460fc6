//! Frame sinks: the encoding half of a media backend.

use std::sync::{Arc, Mutex, PoisonError};

use crate::foundation::core::FrameRGBA;
use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::foundation::time::MediaTime;

/// Video codec a sink encodes with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoCodec {
    /// H.264 (`avc1`).
    H264,
    /// Apple ProRes 4444 with alpha (`ap4h`).
    ProRes4444,
    /// Apple ProRes 422 (`apcn`).
    ProRes422,
    /// Motion JPEG (`jpeg`).
    Jpeg,
}

impl VideoCodec {
    /// Four-character codec type.
    pub fn fourcc(self) -> &'static str {
        match self {
            Self::H264 => "avc1",
            Self::ProRes4444 => "ap4h",
            Self::ProRes422 => "apcn",
            Self::Jpeg => "jpeg",
        }
    }

    /// Whether the codec stores an alpha channel.
    pub fn keeps_alpha(self) -> bool {
        matches!(self, Self::ProRes4444)
    }
}

/// Encoding parameters handed to [`FrameSink::begin`].
#[derive(Clone, Debug, PartialEq)]
pub struct SinkConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Nominal duration of one frame.
    pub frame_duration: MediaTime,
    /// Codec.
    pub codec: VideoCodec,
    /// Target average bit rate, when the codec takes one.
    pub bit_rate: Option<u64>,
}

impl SinkConfig {
    /// Reject empty frames and non-positive frame durations.
    pub fn validate(&self) -> MovingImagesResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MovingImagesError::invalid_parameter(
                "sink width/height must be non-zero",
            ));
        }
        if !self.frame_duration.is_numeric() || self.frame_duration.value <= 0 {
            return Err(MovingImagesError::invalid_parameter(
                "sink frame duration must be positive",
            ));
        }
        Ok(())
    }

    /// Frames per second as an exact `num/den` pair.
    pub fn rate(&self) -> (i64, i64) {
        (i64::from(self.frame_duration.timescale), self.frame_duration.value)
    }
}

/// Receives composed frames in presentation order.
pub trait FrameSink: Send {
    /// Start a stream. Called once before the first frame.
    fn begin(&mut self, config: &SinkConfig) -> MovingImagesResult<()>;

    /// Append a premultiplied frame presented at `time`.
    fn push_frame(&mut self, time: MediaTime, frame: &FrameRGBA) -> MovingImagesResult<()>;

    /// Finish the stream and flush the output.
    fn end(&mut self) -> MovingImagesResult<()>;

    /// Abandon the stream. Output may be partial or removed.
    fn cancel(&mut self) {}
}

/// What an [`InMemorySink`] has received so far.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SinkRecording {
    /// Configuration passed to `begin`.
    pub config: Option<SinkConfig>,
    /// Frames in push order.
    pub frames: Vec<(MediaTime, FrameRGBA)>,
    /// `end` was called.
    pub finished: bool,
    /// `cancel` was called.
    pub cancelled: bool,
}

/// Sink that keeps every frame in memory. Clones share the same recording.
#[derive(Clone, Debug, Default)]
pub struct InMemorySink {
    state: Arc<Mutex<SinkRecording>>,
}

impl InMemorySink {
    /// Empty recording.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recording.
    pub fn recording(&self) -> SinkRecording {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn with<R>(&self, f: impl FnOnce(&mut SinkRecording) -> R) -> R {
        f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, config: &SinkConfig) -> MovingImagesResult<()> {
        config.validate()?;
        self.with(|r| {
            if r.config.is_some() {
                return Err(MovingImagesError::operation_failed("sink already started"));
            }
            r.config = Some(config.clone());
            Ok(())
        })
    }

    fn push_frame(&mut self, time: MediaTime, frame: &FrameRGBA) -> MovingImagesResult<()> {
        self.with(|r| {
            let Some(cfg) = &r.config else {
                return Err(MovingImagesError::operation_failed("sink not started"));
            };
            if r.finished || r.cancelled {
                return Err(MovingImagesError::operation_failed("sink already closed"));
            }
            if frame.width != cfg.width || frame.height != cfg.height {
                return Err(MovingImagesError::invalid_parameter(format!(
                    "frame size mismatch: got {}x{}, expected {}x{}",
                    frame.width, frame.height, cfg.width, cfg.height
                )));
            }
            r.frames.push((time, frame.clone()));
            Ok(())
        })
    }

    fn end(&mut self) -> MovingImagesResult<()> {
        self.with(|r| {
            if r.config.is_none() {
                return Err(MovingImagesError::operation_failed("sink not started"));
            }
            r.finished = true;
            Ok(())
        })
    }

    fn cancel(&mut self) {
        self.with(|r| r.cancelled = true);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/sink.rs"]
mod tests;

//! Video frames writer: still images in, one movie file out.

use std::path::PathBuf;
use std::str::FromStr;

use serde_json::{Map, Value, json};

use crate::foundation::core::{FrameRGBA, Size};
use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::foundation::time::{MediaTime, PREFERRED_TIMESCALE};
use crate::graphics::codec;
use crate::media::backend::{MediaBackend, MovieFileType, MovieSinkSpec};
use crate::media::sink::{FrameSink, SinkConfig, VideoCodec};
use crate::protocol::property::PropertyValue;
use crate::registry::ObjectType;

/// Encoder settings chosen by `addinputtowriter`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WriterPreset {
    H264Sd,
    H264Hd,
    ProRes4444,
    ProRes422,
    Jpeg,
}

impl WriterPreset {
    pub(crate) const ALL: [WriterPreset; 5] = [
        Self::H264Sd,
        Self::H264Hd,
        Self::ProRes4444,
        Self::ProRes422,
        Self::Jpeg,
    ];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::H264Sd => "h264preset_sd",
            Self::H264Hd => "h264preset_hd",
            Self::ProRes4444 => "prores4444preset",
            Self::ProRes422 => "prores422preset",
            Self::Jpeg => "jpegpreset",
        }
    }

    pub(crate) fn list() -> String {
        Self::ALL.map(Self::as_str).join(" ")
    }

    fn codec(self) -> VideoCodec {
        match self {
            Self::H264Sd | Self::H264Hd => VideoCodec::H264,
            Self::ProRes4444 => VideoCodec::ProRes4444,
            Self::ProRes422 => VideoCodec::ProRes422,
            Self::Jpeg => VideoCodec::Jpeg,
        }
    }

    fn bit_rate(self) -> Option<u64> {
        match self {
            Self::H264Sd => Some(3_145_728),
            Self::H264Hd => Some(15_585_760),
            _ => None,
        }
    }

    /// The `videosettings` dictionary reported for an input.
    fn settings(self, width: u32, height: u32, frame_duration: &MediaTime) -> Value {
        let rate = if frame_duration.value > 0 {
            (f64::from(frame_duration.timescale) / frame_duration.value as f64).round() as i64
        } else {
            0
        };
        let codec = self.codec().fourcc();
        match self {
            Self::H264Sd => json!({
                "AVVideoCodecKey": codec,
                "AVVideoCompressionPropertiesKey": {
                    "ExpectedFrameRate": rate,
                    "AverageBitRate": self.bit_rate(),
                    "MaxKeyFrameInterval": 30,
                    "ProfileLevel": "H264_Baseline_AutoLevel",
                },
                "AVVideoHeightKey": height,
                "AVVideoWidthKey": width,
            }),
            Self::H264Hd => json!({
                "AVVideoCodecKey": codec,
                "AVVideoCompressionPropertiesKey": {
                    "AllowFrameReordering": 1,
                    "AverageBitRate": self.bit_rate(),
                    "ExpectedFrameRate": rate,
                    "H264EntropyMode": "CABAC",
                    "MaxKeyFrameInterval": 30,
                    "ProfileLevel": "H264_High_AutoLevel",
                },
                "AVVideoHeightKey": height,
                "AVVideoWidthKey": width,
            }),
            Self::ProRes4444 | Self::ProRes422 => json!({
                "AVVideoColorPropertiesKey": {
                    "TransferFunction": "ITU_R_709_2",
                    "YCbCrMatrix": "ITU_R_709_2",
                    "ColorPrimaries": "ITU_R_709_2",
                },
                "AVVideoCodecKey": codec,
                "AVVideoHeightKey": height,
                "AVVideoWidthKey": width,
                "AVVideoScalingModeKey": "AVVideoScalingModeResizeAspect",
            }),
            Self::Jpeg => json!({
                "AVVideoCodecKey": codec,
                "AVVideoCompressionPropertiesKey": {"Quality": 0.9},
                "AVVideoHeightKey": height,
                "AVVideoWidthKey": width,
            }),
        }
    }
}

impl FromStr for WriterPreset {
    type Err = MovingImagesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| MovingImagesError::invalid_parameter(format!("unknown writer preset '{s}'")))
    }
}

/// `videowriterstatus` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WriterStatus {
    Unknown = 0,
    Writing = 1,
    Completed = 2,
    Failed = 3,
    Cancelled = 4,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct WriterInput {
    pub(crate) preset: WriterPreset,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) frame_duration: MediaTime,
}

pub(crate) struct VideoFramesWriter {
    path: String,
    file_type: MovieFileType,
    input: Option<WriterInput>,
    sink: Option<Box<dyn FrameSink>>,
    status: WriterStatus,
    /// Where the next frame goes when no `frametime` is given.
    next_time: MediaTime,
    last_time: Option<MediaTime>,
}

impl std::fmt::Debug for VideoFramesWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFramesWriter")
            .field("path", &self.path)
            .field("status", &self.status)
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

impl VideoFramesWriter {
    pub(crate) fn new(path: impl Into<String>, file_type: MovieFileType) -> Self {
        Self {
            path: path.into(),
            file_type,
            input: None,
            sink: None,
            status: WriterStatus::Unknown,
            next_time: MediaTime::new(0, PREFERRED_TIMESCALE),
            last_time: None,
        }
    }

    fn can_write(&self) -> bool {
        self.input.is_some() && matches!(self.status, WriterStatus::Unknown | WriterStatus::Writing)
    }

    pub(crate) fn add_input(&mut self, input: WriterInput) -> MovingImagesResult<()> {
        if self.input.is_some() {
            return Err(MovingImagesError::operation_failed("video frames writer already has an input"));
        }
        if input.width == 0 || input.height == 0 {
            return Err(MovingImagesError::invalid_parameter("writer input size must be positive"));
        }
        if !input.frame_duration.is_numeric() || input.frame_duration.value <= 0 {
            return Err(MovingImagesError::invalid_parameter("frameduration must be a positive time"));
        }
        self.input = Some(input);
        Ok(())
    }

    fn start(&mut self, backend: &dyn MediaBackend, input: &WriterInput) -> MovingImagesResult<()> {
        let config = SinkConfig {
            width: input.width,
            height: input.height,
            frame_duration: input.frame_duration,
            codec: input.preset.codec(),
            bit_rate: input.preset.bit_rate(),
        };
        let mut sink = backend.create_sink(&MovieSinkSpec {
            path: PathBuf::from(&self.path),
            file_type: self.file_type,
        })?;
        sink.begin(&config)?;
        tracing::debug!(path = %self.path, preset = input.preset.as_str(), "video writer started");
        self.sink = Some(sink);
        self.status = WriterStatus::Writing;
        Ok(())
    }

    /// Append `frame`, scaled to the input size, at `time` or after the previous frame.
    /// `duration` overrides the input frame duration for the step to the next frame.
    pub(crate) fn add_sample(
        &mut self,
        backend: &dyn MediaBackend,
        frame: &FrameRGBA,
        time: Option<MediaTime>,
        duration: Option<MediaTime>,
    ) -> MovingImagesResult<()> {
        let input = match (&self.input, self.can_write()) {
            (Some(input), true) => input.clone(),
            (None, _) => {
                return Err(MovingImagesError::operation_failed("video frames writer has no input"));
            }
            (Some(_), false) => {
                return Err(MovingImagesError::operation_failed(format!(
                    "video frames writer can no longer write frames (status {})",
                    self.status as u8
                )));
            }
        };
        let at = time.unwrap_or(self.next_time);
        if let Some(last) = self.last_time
            && at.cmp_time(&last).is_le()
        {
            return Err(MovingImagesError::invalid_parameter(format!(
                "frame time {}s is not after the previous frame at {}s",
                at.seconds(),
                last.seconds()
            )));
        }
        let step = duration
            .filter(|d| d.is_numeric() && d.value > 0)
            .unwrap_or(input.frame_duration);
        let scaled = codec::resize(frame, input.width, input.height)?;
        if self.sink.is_none() {
            self.start(backend, &input).inspect_err(|_| self.status = WriterStatus::Failed)?;
        }
        let Some(sink) = self.sink.as_mut() else {
            return Err(MovingImagesError::operation_failed("video writer sink missing"));
        };
        if let Err(e) = sink.push_frame(at, &scaled) {
            self.status = WriterStatus::Failed;
            return Err(e);
        }
        self.last_time = Some(at);
        self.next_time = at.add(&step);
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path))]
    pub(crate) fn finish(&mut self) -> MovingImagesResult<()> {
        let Some(mut sink) = self.sink.take() else {
            self.status = WriterStatus::Failed;
            return Err(MovingImagesError::operation_failed("no frames were written"));
        };
        match sink.end() {
            Ok(()) => {
                self.status = WriterStatus::Completed;
                Ok(())
            }
            Err(e) => {
                self.status = WriterStatus::Failed;
                Err(e)
            }
        }
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.cancel();
        }
        self.status = WriterStatus::Cancelled;
    }

    pub(crate) fn property(&self, key: &str) -> MovingImagesResult<PropertyValue> {
        let input = || {
            self.input.as_ref().ok_or_else(|| {
                MovingImagesError::invalid_property(format!("'{key}' needs a writer input"))
            })
        };
        Ok(match key {
            "file" => PropertyValue::str(&self.path),
            "utifiletype" => PropertyValue::str(self.file_type.uti()),
            "videowriterstatus" => PropertyValue::int(self.status as u8),
            "canwriteframes" => PropertyValue::Bool(self.can_write()),
            "videosettings" => {
                let i = input()?;
                match i.preset.settings(i.width, i.height, &i.frame_duration) {
                    Value::Object(m) => PropertyValue::Dict(m),
                    _ => return Err(MovingImagesError::operation_failed("video settings shape")),
                }
            }
            "frameduration" => PropertyValue::Time(input()?.frame_duration),
            "size" => {
                let i = input()?;
                PropertyValue::Size(Size::new(f64::from(i.width), f64::from(i.height)))
            }
            "time" => {
                input()?;
                PropertyValue::Time(self.next_time)
            }
            _ => {
                return Err(MovingImagesError::invalid_property(format!(
                    "videoframeswriter has no property '{key}'"
                )));
            }
        })
    }

    pub(crate) fn properties(&self, name: &str) -> Map<String, Value> {
        let keys: &[&str] = if self.input.is_some() {
            &[
                "objectname",
                "objecttype",
                "videosettings",
                "frameduration",
                "canwriteframes",
                "file",
                "time",
                "size",
                "videowriterstatus",
                "utifiletype",
            ]
        } else {
            &[
                "file",
                "objectname",
                "objecttype",
                "utifiletype",
                "videowriterstatus",
                "canwriteframes",
            ]
        };
        let mut m = Map::new();
        for key in keys {
            let value = match *key {
                "objectname" => json!(name),
                "objecttype" => json!(ObjectType::VideoFramesWriter.as_str()),
                other => match self.property(other) {
                    Ok(v) => v.to_json(),
                    Err(_) => continue,
                },
            };
            m.insert((*key).to_owned(), value);
        }
        m
    }
}

/// Closing a writer that is still writing abandons its file.
impl Drop for VideoFramesWriter {
    fn drop(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            tracing::debug!(path = %self.path, "writer closed while writing, cancelling");
            sink.cancel();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/writer.rs"]
mod tests;

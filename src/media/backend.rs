//! Capability seam between the command engine and whatever decodes and encodes movies.

use std::path::{Path, PathBuf};

use crate::foundation::core::{Affine, FrameRGBA, Size};
use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::foundation::time::{MediaTime, TimeRange};
use crate::media::editor::ExportPreset;
use crate::media::sink::FrameSink;

/// One metadata entry of a movie.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct MetadataItem {
    /// Metadata format the item belongs to, e.g. `com.apple.quicktime.udta`.
    #[serde(skip)]
    pub format: String,
    /// Item key.
    pub key: String,
    /// Four-character key space.
    pub keyspace: String,
    /// Value rendered as text.
    #[serde(rename = "stringValue")]
    pub value: String,
}

/// Static description of a track as probed from a movie file.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackInfo {
    /// Persistent track id.
    pub track_id: u32,
    /// Four-character media type (`vide`, `soun`, ...).
    pub media_type: String,
    /// Whether the track is enabled for playback.
    pub enabled: bool,
    /// Time range of the track within the movie.
    pub time_range: TimeRange,
    /// Display size before `transform`; zero for non-visual tracks.
    pub natural_size: Size,
    /// Preferred transform.
    pub transform: Affine,
    /// Nominal frame rate.
    pub frame_rate: f64,
    /// Shortest interval between two samples.
    pub min_frame_duration: MediaTime,
    /// Whether decode order differs from presentation order.
    pub requires_frame_reordering: bool,
    /// ISO 639-2/T language code.
    pub language_code: String,
    /// BCP 47 language tag.
    pub language_tag: String,
    /// Preferred volume of audible tracks.
    pub preferred_volume: f64,
}

impl TrackInfo {
    /// A video track of `size` running for `duration` at `frame_duration` per frame.
    pub fn video(track_id: u32, size: Size, duration: MediaTime, frame_duration: MediaTime) -> Self {
        Self {
            track_id,
            media_type: "vide".to_owned(),
            enabled: true,
            time_range: TimeRange::new(MediaTime::new(0, duration.timescale), duration),
            natural_size: size,
            transform: Affine::IDENTITY,
            frame_rate: 1.0 / frame_duration.seconds(),
            min_frame_duration: frame_duration,
            requires_frame_reordering: false,
            language_code: "und".to_owned(),
            language_tag: String::new(),
            preferred_volume: 0.0,
        }
    }
}

/// Everything an importer reports about a movie without decoding frames.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MovieInfo {
    /// Overall duration.
    pub duration: MediaTime,
    /// Tracks in file order.
    pub tracks: Vec<TrackInfo>,
    /// Movie level metadata.
    pub metadata: Vec<MetadataItem>,
}

impl MovieInfo {
    /// Distinct metadata formats, in first-seen order.
    pub fn metadata_formats(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for item in &self.metadata {
            if !out.contains(&item.format.as_str()) {
                out.push(&item.format);
            }
        }
        out
    }
}

/// An opened movie file.
pub trait MovieSource: Send {
    /// Probed description.
    fn info(&self) -> &MovieInfo;

    /// Decode the frame of `track_id` displayed at `time`.
    fn frame_at(&mut self, track_id: u32, time: MediaTime) -> MovingImagesResult<FrameRGBA>;
}

/// Container format of a written movie, by uniform type identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MovieFileType {
    /// `public.mpeg-4`
    Mpeg4,
    /// `com.apple.quicktime-movie`
    QuickTime,
    /// `com.apple.m4v-video`
    M4v,
}

impl MovieFileType {
    /// Every supported container.
    pub const ALL: [MovieFileType; 3] = [Self::Mpeg4, Self::QuickTime, Self::M4v];

    /// Uniform type identifier.
    pub fn uti(self) -> &'static str {
        match self {
            Self::Mpeg4 => "public.mpeg-4",
            Self::QuickTime => "com.apple.quicktime-movie",
            Self::M4v => "com.apple.m4v-video",
        }
    }

    /// Parse a uniform type identifier.
    pub fn from_uti(uti: &str) -> MovingImagesResult<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.uti() == uti)
            .ok_or_else(|| MovingImagesError::invalid_parameter(format!("unsupported movie file type '{uti}'")))
    }

    /// Space separated identifiers.
    pub fn list() -> String {
        Self::ALL.map(Self::uti).join(" ")
    }
}

/// Where a sink writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MovieSinkSpec {
    /// Output file.
    pub path: PathBuf,
    /// Container format.
    pub file_type: MovieFileType,
}

/// Uniform type identifiers of movie containers the ffmpeg backend reads.
pub const DEFAULT_IMPORT_TYPES: [&str; 11] = [
    "public.mpeg-4",
    "com.apple.quicktime-movie",
    "com.apple.m4v-video",
    "public.avi",
    "public.mpeg",
    "public.mpeg-2-video",
    "public.mpeg-2-transport-stream",
    "public.3gpp",
    "public.3gpp2",
    "public.dv-movie",
    "org.webmproject.webm",
];

/// MIME types matching [`DEFAULT_IMPORT_TYPES`].
pub const DEFAULT_IMPORT_MIME_TYPES: [&str; 11] = [
    "video/mp4",
    "video/quicktime",
    "video/x-m4v",
    "video/avi",
    "video/mpeg",
    "video/mpeg2",
    "video/mp2t",
    "video/3gpp",
    "video/3gpp2",
    "video/dv",
    "video/webm",
];

/// Movie decoding and encoding collaborator shared by every object of a context.
pub trait MediaBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Probe `path` and keep it open for frame decoding.
    fn open_movie(&self, path: &Path) -> MovingImagesResult<Box<dyn MovieSource>>;

    /// Prepare an encoder writing to `spec.path`.
    fn create_sink(&self, spec: &MovieSinkSpec) -> MovingImagesResult<Box<dyn FrameSink>>;

    /// Uniform type identifiers of readable movie files.
    fn import_types(&self) -> Vec<String> {
        DEFAULT_IMPORT_TYPES.map(str::to_owned).to_vec()
    }

    /// MIME types of readable movie files.
    fn import_mime_types(&self) -> Vec<String> {
        DEFAULT_IMPORT_MIME_TYPES.map(str::to_owned).to_vec()
    }

    /// Movie editor export presets this backend can encode.
    fn export_presets(&self) -> Vec<String> {
        ExportPreset::ALL.map(|p| p.as_str().to_owned()).to_vec()
    }
}

/// Backend used when no movie tooling is compiled in; every media request fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableBackend;

impl MediaBackend for UnavailableBackend {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn open_movie(&self, path: &Path) -> MovingImagesResult<Box<dyn MovieSource>> {
        Err(MovingImagesError::operation_failed(format!(
            "cannot open '{}': built without a media backend (enable the `media-ffmpeg` feature)",
            path.display()
        )))
    }

    fn create_sink(&self, spec: &MovieSinkSpec) -> MovingImagesResult<Box<dyn FrameSink>> {
        Err(MovingImagesError::operation_failed(format!(
            "cannot write '{}': built without a media backend (enable the `media-ffmpeg` feature)",
            spec.path.display()
        )))
    }
}

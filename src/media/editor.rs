//! Editable video compositions: tracks of segments, layer instructions and export.
//!
//! Segment times are kept as ticks at [`EDITOR_TIMESCALE`]. Export composites every output
//! frame on the CPU and streams it to a [`FrameSink`] from the context's backend.

use std::path::PathBuf;
use std::str::FromStr;

use serde_json::{Map, Value, json};

use crate::foundation::core::{Affine, Color, FrameRGBA, Rect, Size};
use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::foundation::time::{MediaTime, PREFERRED_TIMESCALE, TimeRange};
use crate::graphics::composite::{self, BlendMode};
use crate::graphics::path::rect_path;
use crate::graphics::render;
use crate::media::backend::{MediaBackend, MovieFileType, MovieSinkSpec, TrackInfo};
use crate::media::importer::{SharedSource, VISUAL_TRACK_KEYS, track_dictionary, track_property};
use crate::media::sink::{FrameSink, SinkConfig, VideoCodec};
use crate::media::track::TrackSelector;
use crate::protocol::command::{PropertyQuery, Setting};
use crate::protocol::property::PropertyValue;
use crate::protocol::values::Fields;
use crate::registry::{ObjectReference, ObjectType, lock};

pub(crate) const EDITOR_TIMESCALE: i32 = PREFERRED_TIMESCALE;
const DURATION_TIMESCALE: i32 = 600;
const DEFAULT_FRAME_RATE: i64 = 30;

/// Whole ticks at [`EDITOR_TIMESCALE`]. Invalid or negative times are rejected.
fn ticks(t: &MediaTime, what: &str) -> MovingImagesResult<i64> {
    if !t.is_numeric() || t.value < 0 {
        return Err(MovingImagesError::invalid_parameter(format!(
            "{what} must be a valid non-negative time"
        )));
    }
    Ok(t.convert_scale(EDITOR_TIMESCALE).value)
}

fn at_ticks(value: i64) -> MediaTime {
    MediaTime::new(value, EDITOR_TIMESCALE)
}

/// Movie export presets; the sized ones are bounding boxes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ExportPreset {
    Low,
    Medium,
    Highest,
    P640x480,
    P960x540,
    P1280x720,
    P1920x1080,
    P3840x2160,
}

impl ExportPreset {
    pub(crate) const ALL: [ExportPreset; 8] = [
        Self::Low,
        Self::Medium,
        Self::Highest,
        Self::P640x480,
        Self::P960x540,
        Self::P1280x720,
        Self::P1920x1080,
        Self::P3840x2160,
    ];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Low => "AVAssetExportPresetLowQuality",
            Self::Medium => "AVAssetExportPresetMediumQuality",
            Self::Highest => "AVAssetExportPresetHighestQuality",
            Self::P640x480 => "AVAssetExportPreset640x480",
            Self::P960x540 => "AVAssetExportPreset960x540",
            Self::P1280x720 => "AVAssetExportPreset1280x720",
            Self::P1920x1080 => "AVAssetExportPreset1920x1080",
            Self::P3840x2160 => "AVAssetExportPreset3840x2160",
        }
    }

    fn bounds(self) -> Option<(f64, f64)> {
        match self {
            Self::Low => Some((320.0, 240.0)),
            Self::Medium => Some((480.0, 360.0)),
            Self::Highest => None,
            Self::P640x480 => Some((640.0, 480.0)),
            Self::P960x540 => Some((960.0, 540.0)),
            Self::P1280x720 => Some((1280.0, 720.0)),
            Self::P1920x1080 => Some((1920.0, 1080.0)),
            Self::P3840x2160 => Some((3840.0, 2160.0)),
        }
    }

    /// Output size for a render size: scaled down to fit, never up, even dimensions.
    pub(crate) fn fit(self, render: Size) -> (u32, u32) {
        let scale = match self.bounds() {
            Some((bw, bh)) => (bw / render.width).min(bh / render.height).min(1.0),
            None => 1.0,
        };
        let even = |v: f64| {
            let v = v.round().max(2.0) as u32;
            v - v % 2
        };
        (even(render.width * scale), even(render.height * scale))
    }

    pub(crate) fn list() -> String {
        Self::ALL.map(Self::as_str).join(" ")
    }

    pub(crate) fn file_types() -> String {
        [MovieFileType::QuickTime, MovieFileType::Mpeg4, MovieFileType::M4v]
            .map(MovieFileType::uti)
            .join(" ")
    }
}

impl FromStr for ExportPreset {
    type Err = MovingImagesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| MovingImagesError::invalid_parameter(format!("unknown export preset '{s}'")))
    }
}

/// Where a segment's frames come from.
#[derive(Clone)]
pub(crate) struct SegmentSource {
    pub(crate) movie: SharedSource,
    pub(crate) track: TrackInfo,
    /// Ticks into the source track.
    pub(crate) start: i64,
}

impl SegmentSource {
    pub(crate) fn new(movie: SharedSource, track: TrackInfo, start: &MediaTime) -> MovingImagesResult<Self> {
        Ok(Self {
            movie,
            track,
            start: ticks(start, "sourcetimerange start")?,
        })
    }
}

#[derive(Clone)]
struct Segment {
    source: Option<SegmentSource>,
    duration: i64,
}

#[derive(Clone)]
struct EditorTrack {
    id: u32,
    enabled: bool,
    transform: Affine,
    segments: Vec<Segment>,
}

impl EditorTrack {
    fn end(&self) -> i64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    fn first_source(&self) -> Option<&SegmentSource> {
        self.segments.iter().find_map(|s| s.source.as_ref())
    }

    fn has_empty_segment(&self) -> bool {
        self.segments.iter().any(|s| s.source.is_none())
    }

    /// Insert at `at` ticks, splitting the segment that spans it. A gap before `at` is padded
    /// with an empty segment.
    fn insert(&mut self, at: i64, segment: Segment) {
        let end = self.end();
        if at >= end {
            if at > end {
                self.segments.push(Segment {
                    source: None,
                    duration: at - end,
                });
            }
            self.segments.push(segment);
            return;
        }
        let mut start = 0;
        let mut index = 0;
        while index < self.segments.len() {
            let duration = self.segments[index].duration;
            if at == start {
                break;
            }
            if at < start + duration {
                let head = at - start;
                let mut tail = self.segments[index].clone();
                tail.duration = duration - head;
                if let Some(src) = tail.source.as_mut() {
                    src.start += head;
                }
                self.segments[index].duration = head;
                index += 1;
                self.segments.insert(index, tail);
                break;
            }
            start += duration;
            index += 1;
        }
        self.segments.insert(index, segment);
    }

    /// Source and source time (ticks) shown at `t`.
    fn sample_at(&self, t: i64) -> Option<(&SegmentSource, i64)> {
        let mut start = 0;
        for seg in &self.segments {
            if t < start + seg.duration {
                return seg.source.as_ref().map(|s| (s, s.start + t - start));
            }
            start += seg.duration;
        }
        None
    }

    fn mappings(&self) -> Vec<Value> {
        let mut out = Vec::new();
        let mut target = 0;
        for seg in &self.segments {
            if let Some(src) = &seg.source {
                out.push(json!({
                    "sourcetimerange": TimeRange::new(at_ticks(src.start), at_ticks(seg.duration)),
                    "targettimerange": TimeRange::new(at_ticks(target), at_ticks(seg.duration)),
                }));
            }
            target += seg.duration;
        }
        out
    }

    /// Track description in importer terms, derived from the first source segment.
    fn info(&self) -> TrackInfo {
        let source = self.first_source().map(|s| &s.track);
        let end = self.end();
        TrackInfo {
            track_id: self.id,
            media_type: "vide".to_owned(),
            enabled: self.enabled,
            time_range: if self.segments.is_empty() {
                TimeRange::invalid()
            } else {
                TimeRange::new(at_ticks(0), at_ticks(end))
            },
            natural_size: source.map_or(Size::ZERO, |t| t.natural_size),
            transform: self.transform,
            frame_rate: source.map_or(0.0, |t| t.frame_rate),
            min_frame_duration: source.map_or_else(MediaTime::invalid, |t| t.min_frame_duration),
            requires_frame_reordering: false,
            language_code: String::new(),
            language_tag: String::new(),
            preferred_volume: 0.0,
        }
    }

    /// Bounding box of the natural size under the track transform.
    fn render_bounds(&self) -> Option<Rect> {
        let size = self.first_source()?.track.natural_size;
        Some(self.transform.transform_rect_bbox(Rect::from_origin_size((0.0, 0.0), size)))
    }
}

/// A value that is either held from a time on or ramped over a range.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Animated<T> {
    From { value: T, at: Option<i64> },
    Ramp { start: T, end: T, range: Option<(i64, i64)> },
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum LayerKind {
    Passthru,
    Opacity(Animated<f64>),
    Transform(Animated<Affine>),
    Crop(Animated<Rect>),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LayerInstruction {
    pub(crate) track: TrackSelector,
    pub(crate) kind: LayerKind,
}

/// An `addmovieinstruction`: layers listed top first.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct MovieInstruction {
    pub(crate) time_range: TimeRange,
    pub(crate) layers: Vec<LayerInstruction>,
}

fn opt_ticks(f: &Fields<'_>, key: &str) -> MovingImagesResult<Option<i64>> {
    f.opt_time(key)?.map(|t| ticks(&t, key)).transpose()
}

fn ramp_range(f: &Fields<'_>) -> MovingImagesResult<Option<(i64, i64)>> {
    match f.opt_time_range("timerange")? {
        Some(r) => {
            let start = ticks(&r.start, "ramp start")?;
            Ok(Some((start, start + ticks(&r.duration, "ramp duration")?)))
        }
        None => Ok(opt_ticks(f, "time")?.map(|s| (s, i64::MAX))),
    }
}

impl LayerInstruction {
    fn parse(f: &Fields<'_>) -> MovingImagesResult<Self> {
        let track = TrackSelector::parse_key(f, "track")?
            .ok_or_else(|| MovingImagesError::invalid_parameter("layer instruction needs 'track'"))?;
        let rect_value = |key: &str| -> MovingImagesResult<Rect> {
            let r = f.nested(key)?;
            let origin = r.point("origin")?;
            let size = r.size("size")?;
            Ok(Rect::from_origin_size(origin, size))
        };
        let transform_value = |key: &str| -> MovingImagesResult<Affine> {
            let v = f
                .get(key)
                .ok_or_else(|| MovingImagesError::invalid_parameter(format!("missing '{key}'")))?;
            f.transform_value(v)
        };
        let kind = match f.str("layerinstructiontype")? {
            "passthru" => LayerKind::Passthru,
            "opacity" => LayerKind::Opacity(Animated::From {
                value: f.f64("instructionvalue")?.clamp(0.0, 1.0),
                at: opt_ticks(f, "time")?,
            }),
            "opacityramp" => LayerKind::Opacity(Animated::Ramp {
                start: f.f64("startrampvalue")?.clamp(0.0, 1.0),
                end: f.f64("endrampvalue")?.clamp(0.0, 1.0),
                range: ramp_range(f)?,
            }),
            "transform" => LayerKind::Transform(Animated::From {
                value: transform_value("instructionvalue")?,
                at: opt_ticks(f, "time")?,
            }),
            "transformramp" => LayerKind::Transform(Animated::Ramp {
                start: transform_value("startrampvalue")?,
                end: transform_value("endrampvalue")?,
                range: ramp_range(f)?,
            }),
            "crop" => LayerKind::Crop(Animated::From {
                value: rect_value("instructionvalue")?,
                at: opt_ticks(f, "time")?,
            }),
            "croprectramp" => LayerKind::Crop(Animated::Ramp {
                start: rect_value("startrampvalue")?,
                end: rect_value("endrampvalue")?,
                range: ramp_range(f)?,
            }),
            other => {
                return Err(MovingImagesError::invalid_parameter(format!(
                    "unknown layerinstructiontype '{other}'"
                )));
            }
        };
        Ok(Self { track, kind })
    }
}

impl MovieInstruction {
    pub(crate) fn parse(f: &Fields<'_>) -> MovingImagesResult<Self> {
        let time_range = f.time_range("timerange")?;
        let layers = f
            .array("layerinstructions")?
            .iter()
            .map(|l| LayerInstruction::parse(&f.with(l)?))
            .collect::<MovingImagesResult<Vec<_>>>()?;
        Ok(Self { time_range, layers })
    }

    fn span(&self) -> MovingImagesResult<(i64, i64)> {
        let start = ticks(&self.time_range.start, "instruction start")?;
        let duration = ticks(&self.time_range.duration, "instruction duration")?;
        if duration == 0 {
            return Err(MovingImagesError::invalid_parameter("instruction time range is empty"));
        }
        Ok((start, start + duration))
    }
}

/// Linear blend of two values at `k` in `0..=1`.
pub(crate) trait Lerp: Copy {
    fn lerp(self, other: Self, k: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(self, other: Self, k: f64) -> Self {
        self + (other - self) * k
    }
}

impl Lerp for Affine {
    fn lerp(self, other: Self, k: f64) -> Self {
        let (a, b) = (self.as_coeffs(), other.as_coeffs());
        Affine::new(std::array::from_fn(|i| a[i].lerp(b[i], k)))
    }
}

impl Lerp for Rect {
    fn lerp(self, other: Self, k: f64) -> Self {
        Rect::new(
            self.x0.lerp(other.x0, k),
            self.y0.lerp(other.y0, k),
            self.x1.lerp(other.x1, k),
            self.y1.lerp(other.y1, k),
        )
    }
}

impl<T: Lerp> Animated<T> {
    /// Value at `t`; `None` before it takes effect. `from` is the instruction start.
    fn at(&self, t: i64, from: i64, until: i64) -> Option<T> {
        match self {
            Self::From { value, at } => (t >= at.unwrap_or(from)).then_some(*value),
            Self::Ramp { start, end, range } => {
                let (r0, r1) = range.unwrap_or((from, until));
                let r1 = r1.min(until).max(r0);
                if t < r0 {
                    return None;
                }
                if r1 == r0 {
                    return Some(*end);
                }
                let k = ((t - r0) as f64 / (r1 - r0) as f64).clamp(0.0, 1.0);
                Some(start.lerp(*end, k))
            }
        }
    }
}

/// How one track is drawn into an output frame.
struct Layer<'a> {
    track: &'a EditorTrack,
    opacity: f64,
    transform: Affine,
    crop: Option<Rect>,
}

pub(crate) struct ExportRequest {
    pub(crate) preset: ExportPreset,
    pub(crate) file_type: MovieFileType,
    pub(crate) path: PathBuf,
}

#[derive(Default)]
pub(crate) struct MovieEditor {
    tracks: Vec<EditorTrack>,
    instructions: Vec<MovieInstruction>,
    natural_size: Size,
}

impl std::fmt::Debug for MovieEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieEditor")
            .field("tracks", &self.tracks.len())
            .field("instructions", &self.instructions.len())
            .field("natural_size", &self.natural_size)
            .finish()
    }
}

impl MovieEditor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn track_index(&self, selector: &TrackSelector) -> MovingImagesResult<usize> {
        selector.position(self.tracks.iter().map(|t| (t.id, "vide")))
    }

    fn track(&self, selector: &TrackSelector) -> MovingImagesResult<&EditorTrack> {
        Ok(&self.tracks[self.track_index(selector)?])
    }

    /// Add an empty video track and return its id. A taken `requested` id moves to the next free one.
    pub(crate) fn create_track(&mut self, media_type: &str, requested: Option<u32>) -> MovingImagesResult<u32> {
        if media_type != "vide" {
            return Err(MovingImagesError::operation_failed(format!(
                "movie editor tracks must be video, got '{media_type}'"
            )));
        }
        let taken = |id: u32| self.tracks.iter().any(|t| t.id == id);
        let mut id = requested.filter(|id| *id > 0).unwrap_or(1);
        while taken(id) {
            id += 1;
        }
        self.tracks.push(EditorTrack {
            id,
            enabled: true,
            transform: Affine::IDENTITY,
            segments: Vec::new(),
        });
        Ok(id)
    }

    /// Insert `duration` of `source` at `at`. Returns the target range covered.
    pub(crate) fn insert_segment(
        &mut self,
        track: &TrackSelector,
        source: SegmentSource,
        duration: MediaTime,
        at: MediaTime,
    ) -> MovingImagesResult<TimeRange> {
        let duration = ticks(&duration, "source duration")?;
        let at = ticks(&at, "insertiontime")?;
        let source_end = ticks(&source.track.time_range.end(), "source track end").unwrap_or(i64::MAX);
        if duration == 0 || source.start + duration > source_end {
            return Err(MovingImagesError::operation_failed(
                "source time range is empty or extends past the source track",
            ));
        }
        let index = self.track_index(track)?;
        self.tracks[index].insert(
            at,
            Segment {
                source: Some(source),
                duration,
            },
        );
        Ok(TimeRange::new(at_ticks(at), at_ticks(duration)))
    }

    pub(crate) fn insert_empty_segment(&mut self, track: &TrackSelector, range: &TimeRange) -> MovingImagesResult<()> {
        let at = ticks(&range.start, "timerange start")?;
        let duration = ticks(&range.duration, "timerange duration")?;
        let index = self.track_index(track)?;
        if duration > 0 {
            self.tracks[index].insert(
                at,
                Segment {
                    source: None,
                    duration,
                },
            );
        }
        Ok(())
    }

    pub(crate) fn add_instruction(&mut self, instruction: MovieInstruction) -> MovingImagesResult<()> {
        instruction.span()?;
        for layer in &instruction.layers {
            self.track_index(&layer.track)?;
        }
        self.instructions.push(instruction);
        Ok(())
    }

    pub(crate) fn add_passthru(&mut self, track: &TrackSelector, time_range: TimeRange) -> MovingImagesResult<()> {
        self.add_instruction(MovieInstruction {
            time_range,
            layers: vec![LayerInstruction {
                track: track.clone(),
                kind: LayerKind::Passthru,
            }],
        })
    }

    fn has_content(&self) -> bool {
        self.tracks.iter().any(|t| t.first_source().is_some())
    }

    fn duration_ticks(&self) -> i64 {
        self.tracks.iter().map(EditorTrack::end).max().unwrap_or(0)
    }

    pub(crate) fn duration(&self) -> MediaTime {
        match self.duration_ticks() {
            0 => MediaTime::zero(),
            d => at_ticks(d).convert_scale(DURATION_TIMESCALE),
        }
    }

    /// The set size, or the union of the transformed track sizes.
    pub(crate) fn natural_size(&self) -> Size {
        if self.natural_size.width > 0.0 && self.natural_size.height > 0.0 {
            return self.natural_size;
        }
        self.tracks
            .iter()
            .filter_map(EditorTrack::render_bounds)
            .reduce(|a, b| a.union(b))
            .map_or(Size::ZERO, |r| Size::new(r.x1.max(0.0).ceil(), r.y1.max(0.0).ceil()))
    }

    pub(crate) fn set_property(&mut self, track: Option<&TrackSelector>, setting: &Setting) -> MovingImagesResult<()> {
        match (track, setting) {
            (None, Setting::NaturalSize(size)) => {
                if size.width < 0.0 || size.height < 0.0 {
                    return Err(MovingImagesError::invalid_parameter("natural size cannot be negative"));
                }
                self.natural_size = *size;
            }
            (Some(sel), Setting::TrackEnabled(enabled)) => {
                let i = self.track_index(sel)?;
                self.tracks[i].enabled = *enabled;
            }
            (Some(sel), Setting::Transform(transform)) => {
                let i = self.track_index(sel)?;
                self.tracks[i].transform = *transform;
            }
            (_, other) => {
                return Err(MovingImagesError::invalid_property(format!(
                    "movieeditor cannot set {other:?} {}",
                    if track.is_some() { "on a track" } else { "on the movie" }
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn property(&self, query: &PropertyQuery) -> MovingImagesResult<PropertyValue> {
        if let Some(sel) = &query.track {
            let track = self.track(sel)?;
            if query.key == "segmentmappings" {
                return Ok(PropertyValue::List(track.mappings()));
            }
            return track_property(&track.info(), &query.key).ok_or_else(|| {
                MovingImagesError::invalid_property(format!("movieeditor track has no property '{}'", query.key))
            });
        }
        Ok(match query.key.as_str() {
            "numberoftracks" => PropertyValue::int(
                self.tracks
                    .iter()
                    .filter(|_| query.filter.matches("vide"))
                    .count() as i64,
            ),
            "metadataformats" => PropertyValue::str(""),
            "duration" => PropertyValue::Time(self.duration()),
            "naturalsize" => PropertyValue::Size(self.natural_size()),
            "exportcompatiblepresets" if self.has_content() => PropertyValue::str(ExportPreset::list()),
            "exportcompatiblepresets" => PropertyValue::str(""),
            "exporttypes" => {
                let preset = query.export_preset.as_deref().ok_or_else(|| {
                    MovingImagesError::invalid_parameter("exporttypes needs 'exportpreset'")
                })?;
                preset.parse::<ExportPreset>()?;
                PropertyValue::str(ExportPreset::file_types())
            }
            key => {
                return Err(MovingImagesError::invalid_property(format!(
                    "movieeditor has no property '{key}'"
                )));
            }
        })
    }

    pub(crate) fn properties(&self, name: &str, reference: ObjectReference) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("objecttype".into(), json!(ObjectType::MovieEditor.as_str()));
        m.insert("objectname".into(), json!(name));
        m.insert("numberoftracks".into(), json!(self.tracks.len()));
        m.insert("objectreference".into(), json!(reference));
        m.insert("metadataformats".into(), json!(""));
        m.insert("duration".into(), json!(self.duration()));
        m
    }

    pub(crate) fn track_properties(&self, selector: &TrackSelector) -> MovingImagesResult<Map<String, Value>> {
        let track = self.track(selector)?;
        Ok(track_dictionary(&track.info(), &VISUAL_TRACK_KEYS))
    }

    /// Layers visible at `t`, bottom first.
    fn layers_at(&self, t: i64) -> MovingImagesResult<Vec<Layer<'_>>> {
        let mut covering = None;
        for ins in &self.instructions {
            let (start, end) = ins.span()?;
            if (start..end).contains(&t) {
                covering = Some((ins, start, end));
                break;
            }
        }
        let Some((ins, start, end)) = covering else {
            return Ok(self
                .tracks
                .iter()
                .rev()
                .map(|track| Layer {
                    track,
                    opacity: 1.0,
                    transform: track.transform,
                    crop: None,
                })
                .collect());
        };
        let mut layers = Vec::with_capacity(ins.layers.len());
        for li in ins.layers.iter().rev() {
            let track = self.track(&li.track)?;
            let mut layer = Layer {
                track,
                opacity: 1.0,
                transform: track.transform,
                crop: None,
            };
            match &li.kind {
                LayerKind::Passthru => {}
                LayerKind::Opacity(a) => layer.opacity = a.at(t, start, end).unwrap_or(1.0),
                LayerKind::Transform(a) => {
                    if let Some(m) = a.at(t, start, end) {
                        layer.transform = m;
                    }
                }
                LayerKind::Crop(a) => layer.crop = a.at(t, start, end),
            }
            layers.push(layer);
        }
        Ok(layers)
    }

    /// Composite the output frame at `t` ticks, scaling render space by `scale`.
    fn compose(&self, t: i64, width: u32, height: u32, scale: Affine) -> MovingImagesResult<FrameRGBA> {
        let mut canvas = FrameRGBA::new(width, height)?;
        let h = f64::from(height);
        for layer in self.layers_at(t)? {
            if !layer.track.enabled || layer.opacity <= 0.0 {
                continue;
            }
            let Some((source, src_ticks)) = layer.track.sample_at(t) else {
                continue;
            };
            let mut frame = lock(&source.movie).frame_at(source.track.track_id, at_ticks(src_ticks))?;
            if let Some(crop) = layer.crop {
                crop_in_place(&mut frame, crop);
            }
            // Render space is y-down; the rasterizer draws images into y-up user space.
            let fh = f64::from(frame.height);
            let placement = Affine::new([1.0, 0.0, 0.0, -1.0, 0.0, h])
                * scale
                * layer.transform
                * Affine::new([1.0, 0.0, 0.0, -1.0, 0.0, fh]);
            let dest = Rect::new(0.0, 0.0, f64::from(frame.width), fh);
            let pixels = render::image_layer(width, height, &frame, dest, placement)?;
            composite::composite_in_place(&mut canvas.data, &pixels, BlendMode::Normal, layer.opacity)?;
        }
        Ok(canvas)
    }

    /// Frame duration of the fastest source, at the editor timescale.
    fn frame_ticks(&self) -> i64 {
        self.tracks
            .iter()
            .flat_map(|t| t.segments.iter())
            .filter_map(|s| s.source.as_ref())
            .map(|s| s.track.min_frame_duration)
            .filter(|d| d.is_numeric() && d.value > 0)
            .map(|d| d.convert_scale(EDITOR_TIMESCALE).value.max(1))
            .min()
            .unwrap_or(i64::from(EDITOR_TIMESCALE) / DEFAULT_FRAME_RATE)
    }

    #[tracing::instrument(level = "info", skip(self, backend, request), fields(path = %request.path.display(), preset = request.preset.as_str()))]
    pub(crate) fn export(&self, backend: &dyn MediaBackend, request: &ExportRequest) -> MovingImagesResult<()> {
        if !self.has_content() {
            return Err(MovingImagesError::operation_failed("composition has no content to export"));
        }
        if let Some(t) = self.tracks.iter().find(|t| t.has_empty_segment()) {
            return Err(MovingImagesError::operation_failed(format!(
                "track {} contains an empty segment",
                t.id
            )));
        }
        let render_size = self.natural_size();
        if render_size.width < 1.0 || render_size.height < 1.0 {
            return Err(MovingImagesError::operation_failed("composition has a zero render size"));
        }
        let (width, height) = request.preset.fit(render_size);
        let scale = Affine::scale_non_uniform(
            f64::from(width) / render_size.width,
            f64::from(height) / render_size.height,
        );
        let step = self.frame_ticks();
        let duration = self.duration_ticks();
        let config = SinkConfig {
            width,
            height,
            frame_duration: at_ticks(step),
            codec: VideoCodec::H264,
            bit_rate: None,
        };
        let mut sink = backend.create_sink(&MovieSinkSpec {
            path: request.path.clone(),
            file_type: request.file_type,
        })?;
        sink.begin(&config)?;
        let streamed = stream_frames(sink.as_mut(), (0..duration).step_by(step as usize), |t| {
            self.compose(t, width, height, scale)
        });
        match streamed {
            Ok(frames) => {
                sink.end()?;
                tracing::info!(frames, width, height, "movie exported");
                Ok(())
            }
            Err(e) => {
                sink.cancel();
                Err(e)
            }
        }
    }

    /// Timeline picture: one row per track, a bar per segment, empty segments in gray.
    pub(crate) fn composition_map(&self) -> MovingImagesResult<FrameRGBA> {
        const WIDTH: u32 = 800;
        const ROW: f64 = 40.0;
        const GAP: f64 = 10.0;
        let rows = self.tracks.len().max(1) as f64;
        let height = (rows * (ROW + GAP) + GAP) as u32;
        let mut canvas = FrameRGBA::new(WIDTH, height)?;
        let background = render::fill_layer(
            WIDTH,
            height,
            &rect_path(Rect::new(0.0, 0.0, f64::from(WIDTH), f64::from(height))),
            Affine::IDENTITY,
            Color::new(1.0, 1.0, 1.0, 1.0),
        )?;
        canvas.data.copy_from_slice(&background);
        let total = self.duration_ticks().max(1) as f64;
        let usable = f64::from(WIDTH) - 2.0 * GAP;
        let palette = [Color::new(0.2, 0.4, 0.8, 1.0), Color::new(0.9, 0.5, 0.1, 1.0)];
        let empty = Color::new(0.6, 0.6, 0.6, 1.0);
        for (row, track) in self.tracks.iter().enumerate() {
            // y-up: the first track is the top row.
            let y0 = f64::from(height) - (row as f64 + 1.0) * (ROW + GAP);
            let mut start = 0;
            for (i, seg) in track.segments.iter().enumerate() {
                let x0 = GAP + usable * start as f64 / total;
                let x1 = GAP + usable * (start + seg.duration) as f64 / total;
                let color = if seg.source.is_some() { palette[i % 2] } else { empty };
                let bar = render::fill_layer(
                    WIDTH,
                    height,
                    &rect_path(Rect::new(x0, y0, x1.max(x0 + 1.0), y0 + ROW)),
                    Affine::IDENTITY,
                    color,
                )?;
                composite::composite_in_place(&mut canvas.data, &bar, BlendMode::Normal, 1.0)?;
                start += seg.duration;
            }
        }
        Ok(canvas)
    }
}

fn stream_frames(
    sink: &mut dyn FrameSink,
    times: impl Iterator<Item = i64>,
    mut compose: impl FnMut(i64) -> MovingImagesResult<FrameRGBA>,
) -> MovingImagesResult<usize> {
    let mut count = 0;
    for t in times {
        let frame = compose(t)?;
        sink.push_frame(at_ticks(t), &frame)?;
        count += 1;
    }
    Ok(count)
}

/// Clear every pixel outside `rect` (y-down pixel coordinates).
fn crop_in_place(frame: &mut FrameRGBA, rect: Rect) {
    let (x0, y0) = (rect.x0.max(0.0).round() as u32, rect.y0.max(0.0).round() as u32);
    let (x1, y1) = (rect.x1.max(0.0).round() as u32, rect.y1.max(0.0).round() as u32);
    let width = frame.width as usize;
    for (i, px) in frame.data.chunks_exact_mut(4).enumerate() {
        let (x, y) = ((i % width) as u32, (i / width) as u32);
        if x < x0 || x >= x1 || y < y0 || y >= y1 {
            px.fill(0);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/editor.rs"]
mod tests;

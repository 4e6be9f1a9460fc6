//! Read-only movie objects: probing, track properties and frame grabbing.

use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value, json};

use crate::foundation::core::FrameRGBA;
use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::foundation::time::MediaTime;
use crate::media::backend::{MediaBackend, MovieInfo, MovieSource, TrackInfo};
use crate::media::track::{TrackSelector, is_visual};
use crate::protocol::command::PropertyQuery;
use crate::protocol::property::PropertyValue;
use crate::protocol::values::Fields;
use crate::registry::{ObjectReference, ObjectType, Shared, lock};

pub(crate) type SharedSource = Shared<Box<dyn MovieSource>>;

/// When to grab a frame.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum FrameTime {
    At(MediaTime),
    /// One frame after the last grabbed sample, or the track start.
    NextSample,
    /// The last grabbed sample, or the track start.
    Current,
}

/// `frametime` and `tracks` options of a frame grab.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FrameGrab {
    pub(crate) time: FrameTime,
    pub(crate) tracks: Vec<TrackSelector>,
}

impl FrameGrab {
    pub(crate) fn parse(f: &Fields<'_>) -> MovingImagesResult<Self> {
        let time = match f.get("frametime") {
            None => FrameTime::Current,
            Some(Value::String(s)) if s == "nextsample" => FrameTime::NextSample,
            Some(Value::String(s)) => {
                return Err(MovingImagesError::invalid_parameter(format!(
                    "unknown frametime '{s}'"
                )));
            }
            Some(_) => FrameTime::At(f.time("frametime")?),
        };
        let tracks = f
            .opt_array("tracks")?
            .iter()
            .map(|t| TrackSelector::parse(f, t))
            .collect::<MovingImagesResult<_>>()?;
        Ok(Self { time, tracks })
    }
}

pub(crate) struct MovieImporter {
    path: String,
    info: MovieInfo,
    source: SharedSource,
    current_time: MediaTime,
}

impl std::fmt::Debug for MovieImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieImporter")
            .field("path", &self.path)
            .field("tracks", &self.info.tracks.len())
            .finish_non_exhaustive()
    }
}

const MOVIE_KEYS: [&str; 4] = ["file", "numberoftracks", "duration", "metadataformats"];
pub(crate) const VISUAL_TRACK_KEYS: [&str; 11] = [
    "naturalsize",
    "minframeduration",
    "mediatype",
    "timerange",
    "trackid",
    "languagecode",
    "languagetag",
    "affinetransform",
    "requiresframereordering",
    "trackenabled",
    "framerate",
];
const AUDIO_TRACK_KEYS: [&str; 7] = [
    "preferredvolume",
    "mediatype",
    "timerange",
    "trackid",
    "languagecode",
    "languagetag",
    "trackenabled",
];

impl MovieImporter {
    #[tracing::instrument(level = "debug", skip(backend))]
    pub(crate) fn open(backend: &dyn MediaBackend, path: &str) -> MovingImagesResult<Self> {
        let source = backend.open_movie(Path::new(path))?;
        Ok(Self::from_source(path, source))
    }

    pub(crate) fn from_source(path: &str, source: Box<dyn MovieSource>) -> Self {
        Self {
            path: path.to_owned(),
            info: source.info().clone(),
            source: Arc::new(Mutex::new(source)),
            current_time: MediaTime::invalid(),
        }
    }

    /// Decoder handle shared with editors that reference this movie.
    pub(crate) fn source(&self) -> SharedSource {
        Arc::clone(&self.source)
    }

    pub(crate) fn track(&self, selector: &TrackSelector) -> MovingImagesResult<&TrackInfo> {
        let pos = selector.position(
            self.info
                .tracks
                .iter()
                .map(|t| (t.track_id, t.media_type.as_str())),
        )?;
        Ok(&self.info.tracks[pos])
    }

    /// First visual track among `selectors`, or of the movie when none are given.
    fn visual_track(&self, selectors: &[TrackSelector]) -> MovingImagesResult<&TrackInfo> {
        let found = if selectors.is_empty() {
            self.info.tracks.iter().find(|t| is_visual(&t.media_type))
        } else {
            let mut visual = None;
            for s in selectors {
                let t = self.track(s)?;
                if is_visual(&t.media_type) {
                    visual = Some(t);
                    break;
                }
            }
            visual
        };
        found.ok_or_else(|| MovingImagesError::operation_failed("no visual track to take frames from"))
    }

    /// Decode a frame and move `currenttime` to it. Also returns the track's frame duration.
    pub(crate) fn grab(&mut self, grab: &FrameGrab) -> MovingImagesResult<(FrameRGBA, MediaTime)> {
        let track = self.visual_track(&grab.tracks)?.clone();
        let range = track.time_range;
        let step = track.min_frame_duration;
        let time = match &grab.time {
            FrameTime::At(t) => *t,
            FrameTime::Current if self.current_time.is_valid() => self.current_time,
            FrameTime::Current => range.start,
            FrameTime::NextSample if self.current_time.is_valid() => {
                if !step.is_numeric() || step.value <= 0 {
                    return Err(MovingImagesError::operation_failed(
                        "track has no frame duration to step by",
                    ));
                }
                self.current_time.add(&step)
            }
            FrameTime::NextSample => range.start.convert_scale(step.timescale),
        };
        let end = range.end();
        if !time.is_numeric() || time.cmp_time(&end).is_ge() || time.value < 0 {
            return Err(MovingImagesError::operation_failed(format!(
                "no sample at {}s (track ends at {}s)",
                time.seconds(),
                end.seconds()
            )));
        }
        let frame = lock(&self.source).frame_at(track.track_id, time)?;
        self.current_time = time;
        Ok((frame, step))
    }

    pub(crate) fn property(&self, query: &PropertyQuery) -> MovingImagesResult<PropertyValue> {
        if let Some(sel) = &query.track {
            return self.track_property(self.track(sel)?, &query.key);
        }
        Ok(match query.key.as_str() {
            "file" => PropertyValue::str(&self.path),
            "duration" => PropertyValue::Time(self.info.duration),
            "numberoftracks" => PropertyValue::int(
                self.info
                    .tracks
                    .iter()
                    .filter(|t| query.filter.matches(&t.media_type))
                    .count() as i64,
            ),
            "metadataformats" => PropertyValue::str(self.info.metadata_formats().join(" ")),
            "metadata" => {
                let wanted: Option<Vec<&str>> = query
                    .metadata_formats
                    .as_deref()
                    .map(|f| f.split_whitespace().collect());
                PropertyValue::List(
                    self.info
                        .metadata
                        .iter()
                        .filter(|m| wanted.as_ref().is_none_or(|w| w.contains(&m.format.as_str())))
                        .map(|m| json!(m))
                        .collect(),
                )
            }
            "currenttime" => PropertyValue::Time(self.current_time),
            key => {
                return Err(MovingImagesError::invalid_property(format!(
                    "movieimporter has no property '{key}'"
                )));
            }
        })
    }

    fn track_property(&self, track: &TrackInfo, key: &str) -> MovingImagesResult<PropertyValue> {
        track_property(track, key).ok_or_else(|| {
            MovingImagesError::invalid_property(format!(
                "'{key}' does not apply to a '{}' track",
                track.media_type
            ))
        })
    }

    pub(crate) fn properties(&self, name: &str, reference: ObjectReference) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("objecttype".into(), json!(ObjectType::MovieImporter.as_str()));
        m.insert("objectname".into(), json!(name));
        m.insert("objectreference".into(), json!(reference));
        for key in MOVIE_KEYS {
            if let Ok(v) = self.property(&PropertyQuery::key(key)) {
                m.insert(key.to_owned(), v.to_json());
            }
        }
        m
    }

    pub(crate) fn track_properties(&self, selector: &TrackSelector) -> MovingImagesResult<Map<String, Value>> {
        let track = self.track(selector)?;
        let keys: &[&str] = if is_visual(&track.media_type) {
            &VISUAL_TRACK_KEYS
        } else {
            &AUDIO_TRACK_KEYS
        };
        Ok(track_dictionary(track, keys))
    }
}

pub(crate) fn track_dictionary(track: &TrackInfo, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|k| track_property(track, k).map(|v| ((*k).to_owned(), v.to_json())))
        .collect()
}

/// Track property lookup; `None` when the key does not apply to this track.
pub(crate) fn track_property(track: &TrackInfo, key: &str) -> Option<PropertyValue> {
    let visual = is_visual(&track.media_type);
    Some(match key {
        "trackid" => PropertyValue::int(track.track_id),
        "mediatype" => PropertyValue::str(&track.media_type),
        "trackenabled" => PropertyValue::Bool(track.enabled),
        "timerange" => PropertyValue::Range(track.time_range),
        "naturalsize" if visual => PropertyValue::Size(track.natural_size),
        "affinetransform" => PropertyValue::Transform(track.transform),
        "framerate" => PropertyValue::Number(track.frame_rate),
        "minframeduration" => PropertyValue::Time(track.min_frame_duration),
        "requiresframereordering" => PropertyValue::Bool(track.requires_frame_reordering),
        "languagecode" => PropertyValue::str(&track.language_code),
        "languagetag" => PropertyValue::str(&track.language_tag),
        "preferredvolume" if track.media_type == "soun" => PropertyValue::Number(track.preferred_volume),
        "segmentmappings" => PropertyValue::List(vec![json!({
            "sourcetimerange": track.time_range,
            "targettimerange": track.time_range,
        })]),
        _ => return None,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/media/importer.rs"]
mod tests;

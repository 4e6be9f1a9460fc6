//! Track addressing shared by importers and editors.

use serde_json::Value;

use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::protocol::values::Fields;

/// Media type four-character codes, in listing order.
pub(crate) const MEDIA_TYPES: [&str; 8] = ["soun", "clcp", "meta", "muxx", "sbtl", "text", "tmcd", "vide"];

pub(crate) const VISUAL: &str = "AVMediaCharacteristicVisual";
pub(crate) const AUDIBLE: &str = "AVMediaCharacteristicAudible";
pub(crate) const LEGIBLE: &str = "AVMediaCharacteristicLegible";
pub(crate) const FRAME_BASED: &str = "AVMediaCharacteristicFrameBased";

pub(crate) const MEDIA_CHARACTERISTICS: [&str; 11] = [
    AUDIBLE,
    "public.subtitles.forced-only",
    "public.accessibility.describes-music-and-sound",
    "public.accessibility.describes-video",
    "public.easy-to-read",
    FRAME_BASED,
    "public.auxiliary-content",
    "public.main-program-content",
    LEGIBLE,
    "public.accessibility.transcribes-spoken-dialog",
    VISUAL,
];

/// Characteristics a track of `media_type` has.
pub(crate) fn characteristics(media_type: &str) -> &'static [&'static str] {
    match media_type {
        "vide" => &[VISUAL, FRAME_BASED],
        "soun" => &[AUDIBLE],
        "sbtl" | "text" | "clcp" => &[LEGIBLE],
        "muxx" => &[VISUAL, AUDIBLE, FRAME_BASED],
        _ => &[],
    }
}

pub(crate) fn is_visual(media_type: &str) -> bool {
    characteristics(media_type).contains(&VISUAL)
}

/// Filter used by `numberoftracks` and by the index-based selectors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum TrackFilter {
    #[default]
    All,
    MediaType(String),
    Characteristic(String),
}

impl TrackFilter {
    /// `mediatype` wins over `mediacharacteristic`; neither means every track.
    pub(crate) fn parse(f: &Fields<'_>) -> MovingImagesResult<Self> {
        if let Some(t) = f.opt_str("mediatype")? {
            return Ok(Self::MediaType(t.to_owned()));
        }
        Ok(match f.opt_str("mediacharacteristic")? {
            Some(c) => Self::Characteristic(c.to_owned()),
            None => Self::All,
        })
    }

    pub(crate) fn matches(&self, media_type: &str) -> bool {
        match self {
            Self::All => true,
            Self::MediaType(t) => t == media_type,
            Self::Characteristic(c) => characteristics(media_type).contains(&c.as_str()),
        }
    }
}

/// `{"trackid": n}` or `{"mediatype" | "mediacharacteristic": .., "trackindex": i}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum TrackSelector {
    ById(u32),
    ByIndex { filter: TrackFilter, index: usize },
}

impl TrackSelector {
    pub(crate) fn parse(f: &Fields<'_>, v: &Value) -> MovingImagesResult<Self> {
        if let Value::Number(_) = v {
            return Ok(Self::ById(track_id(f.number(v)?)?));
        }
        let t = f.with(v)?;
        if let Some(id) = t.opt_f64("trackid")? {
            return Ok(Self::ById(track_id(id)?));
        }
        let filter = TrackFilter::parse(&t)?;
        if filter == TrackFilter::All {
            return Err(MovingImagesError::invalid_parameter(
                "track needs 'trackid', 'mediatype' or 'mediacharacteristic'",
            ));
        }
        Ok(Self::ByIndex {
            filter,
            index: t.opt_u64("trackindex")?.unwrap_or(0) as usize,
        })
    }

    pub(crate) fn parse_key(f: &Fields<'_>, key: &str) -> MovingImagesResult<Option<Self>> {
        f.get(key).map(|v| Self::parse(f, v)).transpose()
    }

    /// Position of the selected track in `tracks`, given as `(trackid, mediatype)` pairs.
    pub(crate) fn position<'a>(
        &self,
        tracks: impl IntoIterator<Item = (u32, &'a str)>,
    ) -> MovingImagesResult<usize> {
        let found = match self {
            Self::ById(id) => tracks.into_iter().position(|(t, _)| t == *id),
            Self::ByIndex { filter, index } => tracks
                .into_iter()
                .enumerate()
                .filter(|(_, (_, media))| filter.matches(media))
                .nth(*index)
                .map(|(i, _)| i),
        };
        found.ok_or_else(|| MovingImagesError::invalid_parameter(format!("no track matches {self:?}")))
    }
}

fn track_id(v: f64) -> MovingImagesResult<u32> {
    if v.fract() != 0.0 || !(0.0..=f64::from(u32::MAX)).contains(&v) {
        return Err(MovingImagesError::invalid_parameter(format!("invalid track id {v}")));
    }
    Ok(v as u32)
}

#[cfg(test)]
#[path = "../../tests/unit/media/track.rs"]
mod tests;

//! Typed commands parsed from one entry of a batch's `commands` list.
//!
//! Parsing happens at dispatch time so equations and path substitutions see the variables
//! bound by earlier commands. With no variables attached (validation) substitutions parse to
//! placeholders and equations are only syntax checked.

use serde_json::Value;

use crate::foundation::core::{Affine, Rect, Size};
use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::foundation::time::{MediaTime, TimeRange};
use crate::graphics::bitmap::BitmapPreset;
use crate::graphics::draw::{DrawElement, ImageRef, parse_element, parse_image_ref};
use crate::media::backend::MovieFileType;
use crate::media::editor::MovieInstruction;
use crate::media::importer::{FrameGrab, FrameTime};
use crate::media::track::{TrackFilter, TrackSelector};
use crate::media::writer::{WriterInput, WriterPreset};
use crate::protocol::property::DataType;
use crate::protocol::values::Fields;
use crate::registry::{ObjectType, Selector};

/// `{"objectreference": n}` or `{"objecttype": t, "objectname": n}`.
pub(crate) fn parse_selector(f: &Fields<'_>) -> MovingImagesResult<Selector> {
    if let Some(r) = f.opt_u64("objectreference")? {
        return Ok(Selector::ByReference(r));
    }
    match (f.opt_str("objecttype")?, f.opt_str("objectname")?) {
        (Some(kind), Some(name)) => Ok(Selector::ByTypeName(kind.parse()?, name.to_owned())),
        _ => Err(MovingImagesError::invalid_parameter(
            "object selector needs 'objectreference' or 'objecttype' and 'objectname'",
        )),
    }
}

fn receiver(f: &Fields<'_>) -> MovingImagesResult<Selector> {
    parse_selector(&f.nested("receiverobject")?)
}

fn opt_receiver(f: &Fields<'_>) -> MovingImagesResult<Option<Selector>> {
    f.opt_nested("receiverobject")?
        .map(|r| parse_selector(&r))
        .transpose()
}

/// `file`, or the variable named by `pathsubstitution`.
fn file_path(f: &Fields<'_>) -> MovingImagesResult<String> {
    if let Some(key) = f.opt_str("pathsubstitution")? {
        return match f.vars() {
            Some(vars) => vars.substitute_path(key),
            None => Ok(format!("${key}")),
        };
    }
    let path = f.str("file")?;
    if path.is_empty() {
        return Err(MovingImagesError::invalid_parameter("'file' must not be empty"));
    }
    Ok(path.to_owned())
}

fn pixel_size(size: Size, what: &str) -> MovingImagesResult<(u32, u32)> {
    let dim = |v: f64| -> MovingImagesResult<u32> {
        if !v.is_finite() || v < 1.0 || v > f64::from(u32::MAX) {
            return Err(MovingImagesError::invalid_parameter(format!(
                "{what} width and height must be at least 1, got {}x{}",
                size.width, size.height
            )));
        }
        Ok(v.round() as u32)
    };
    Ok((dim(size.width)?, dim(size.height)?))
}

/// Everything a `getproperty` needs besides its receiver.
#[derive(Clone, Debug)]
pub(crate) struct PropertyQuery {
    pub(crate) key: String,
    pub(crate) track: Option<TrackSelector>,
    pub(crate) data_type: DataType,
    /// `mediatype`/`mediacharacteristic` filter for `numberoftracks`.
    pub(crate) filter: TrackFilter,
    /// Space separated formats limiting `metadata`.
    pub(crate) metadata_formats: Option<String>,
    /// Filter for the global `numberofobjects`.
    pub(crate) object_type: Option<ObjectType>,
    pub(crate) export_preset: Option<String>,
}

impl PropertyQuery {
    /// Query for `key` with every option at its default.
    pub(crate) fn key(key: &str) -> Self {
        Self {
            key: key.to_owned(),
            track: None,
            data_type: DataType::default(),
            filter: TrackFilter::All,
            metadata_formats: None,
            object_type: None,
            export_preset: None,
        }
    }

    fn parse(f: &Fields<'_>) -> MovingImagesResult<Self> {
        Ok(Self {
            key: f.str("propertykey")?.to_owned(),
            track: TrackSelector::parse_key(f, "track")?,
            data_type: DataType::parse(f.opt_str("getdatatype")?)?,
            filter: TrackFilter::parse(f)?,
            metadata_formats: f.opt_str("metadataformats")?.map(str::to_owned),
            object_type: f.opt_str("objecttype")?.map(str::parse::<ObjectType>).transpose()?,
            export_preset: f.opt_str("exportpreset")?.map(str::to_owned),
        })
    }
}

/// A settable property and its new value.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Setting {
    NaturalSize(Size),
    TrackEnabled(bool),
    Transform(Affine),
}

impl Setting {
    fn parse(f: &Fields<'_>) -> MovingImagesResult<Self> {
        let key = f.str("propertykey")?;
        // A transformation may sit under its own key instead of `propertyvalue`.
        let value_key = if f.has("propertyvalue") { "propertyvalue" } else { key };
        match key {
            "naturalsize" => Ok(Self::NaturalSize(f.size(value_key)?)),
            "trackenabled" => f
                .opt_bool(value_key)?
                .map(Self::TrackEnabled)
                .ok_or_else(|| MovingImagesError::invalid_parameter("missing 'propertyvalue'")),
            "affinetransform" | "contexttransformation" => {
                let value = f
                    .get(value_key)
                    .ok_or_else(|| MovingImagesError::invalid_parameter("missing 'propertyvalue'"))?;
                Ok(Self::Transform(f.transform_value(value)?))
            }
            other => Err(MovingImagesError::invalid_property(format!(
                "property '{other}' cannot be set"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum CreateKind {
    Bitmap {
        width: u32,
        height: u32,
        preset: BitmapPreset,
    },
    Importer {
        path: String,
    },
    Editor,
    Writer {
        path: String,
        file_type: MovieFileType,
    },
}

impl CreateKind {
    pub(crate) fn object_type(&self) -> ObjectType {
        match self {
            Self::Bitmap { .. } => ObjectType::BitmapContext,
            Self::Importer { .. } => ObjectType::MovieImporter,
            Self::Editor => ObjectType::MovieEditor,
            Self::Writer { .. } => ObjectType::VideoFramesWriter,
        }
    }

    fn parse(f: &Fields<'_>) -> MovingImagesResult<Self> {
        let kind: ObjectType = f.str("objecttype")?.parse()?;
        Ok(match kind {
            ObjectType::BitmapContext => {
                let (width, height) = pixel_size(f.size("size")?, "bitmap")?;
                let preset = match f.opt_str("preset")? {
                    Some(p) => p.parse()?,
                    None => BitmapPreset::AlphaPreMulFirstRgb,
                };
                Self::Bitmap {
                    width,
                    height,
                    preset,
                }
            }
            ObjectType::MovieImporter => Self::Importer { path: file_path(f)? },
            ObjectType::MovieEditor => Self::Editor,
            ObjectType::VideoFramesWriter => Self::Writer {
                path: file_path(f)?,
                file_type: MovieFileType::from_uti(f.str("utifiletype")?)?,
            },
        })
    }
}

/// Output of an `export`; the file type is interpreted by the receiver.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ExportTarget {
    pub(crate) path: String,
    pub(crate) file_type: String,
    pub(crate) preset: Option<String>,
    /// JPEG only, `0..=1`.
    pub(crate) quality: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SegmentInsert {
    pub(crate) track: TrackSelector,
    pub(crate) source: Selector,
    pub(crate) source_track: TrackSelector,
    pub(crate) source_range: TimeRange,
    pub(crate) insertion_time: MediaTime,
    pub(crate) passthru: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ImageSample {
    pub(crate) source: ImageRef,
    pub(crate) time: Option<MediaTime>,
    /// Variable holding the duration of the frame the image came from.
    pub(crate) duration_key: Option<String>,
}

/// One `processinstructions` entry: the frame to grab and the commands run with it.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FrameInstruction {
    pub(crate) grab: FrameGrab,
    pub(crate) commands: Vec<Value>,
}

/// A `processframes` loop. Nested command lists stay raw so each runs against the variables
/// of its own iteration.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ProcessFrames {
    pub(crate) local_context: bool,
    pub(crate) identifier: String,
    pub(crate) duration_key: Option<String>,
    pub(crate) preprocess: Vec<Value>,
    pub(crate) instructions: Vec<FrameInstruction>,
    pub(crate) postprocess: Vec<Value>,
    pub(crate) cleanup: Vec<Value>,
}

impl ProcessFrames {
    fn parse(f: &Fields<'_>) -> MovingImagesResult<Self> {
        let tracks = f
            .opt_array("tracks")?
            .iter()
            .map(|t| TrackSelector::parse(f, t))
            .collect::<MovingImagesResult<Vec<_>>>()?;
        let instructions = f
            .array("processinstructions")?
            .iter()
            .map(|v| {
                let entry = f.with(v)?;
                let mut grab = FrameGrab::parse(&entry)?;
                if !entry.has("frametime") {
                    grab.time = FrameTime::NextSample;
                }
                if grab.tracks.is_empty() {
                    grab.tracks = tracks.clone();
                }
                Ok(FrameInstruction {
                    grab,
                    commands: entry.opt_array("commands")?.to_vec(),
                })
            })
            .collect::<MovingImagesResult<_>>()?;
        Ok(Self {
            local_context: f.bool_or("localcontext", false)?,
            identifier: f.str("imageidentifier")?.to_owned(),
            duration_key: f.opt_str("lastaccessedframedurationkey")?.map(str::to_owned),
            preprocess: f.opt_array("preprocess")?.to_vec(),
            instructions,
            postprocess: f.opt_array("postprocess")?.to_vec(),
            cleanup: f.opt_array("cleanupcommands")?.to_vec(),
        })
    }
}

/// One command, one variant per verb.
#[derive(Clone, Debug)]
pub(crate) enum Command {
    Create {
        name: Option<String>,
        kind: CreateKind,
    },
    Close(Selector),
    CloseAll(Option<ObjectType>),
    GetProperty {
        receiver: Option<Selector>,
        query: PropertyQuery,
    },
    SetProperty {
        receiver: Selector,
        track: Option<TrackSelector>,
        setting: Setting,
    },
    GetProperties {
        receiver: Selector,
        track: Option<TrackSelector>,
        save_as: DataType,
    },
    DrawElement {
        receiver: Selector,
        element: DrawElement,
    },
    GetPixelData {
        receiver: Selector,
        rect: Rect,
    },
    AssignImage {
        receiver: Selector,
        identifier: String,
        grab: FrameGrab,
    },
    LoadImage {
        path: String,
        identifier: String,
    },
    RemoveImage(String),
    Export {
        receiver: Selector,
        target: ExportTarget,
    },
    CreateTrack {
        receiver: Selector,
        media_type: String,
        track_id: Option<u32>,
    },
    InsertSegment {
        receiver: Selector,
        insert: SegmentInsert,
    },
    InsertEmptySegment {
        receiver: Selector,
        track: TrackSelector,
        range: TimeRange,
    },
    AddInstruction {
        receiver: Selector,
        instruction: MovieInstruction,
    },
    AddWriterInput {
        receiver: Selector,
        input: WriterInput,
    },
    AddImageSample {
        receiver: Selector,
        sample: ImageSample,
    },
    FinishWriting(Selector),
    CancelWriting(Selector),
    ProcessFrames {
        receiver: Selector,
        process: ProcessFrames,
    },
}

impl Command {
    /// Parse a command dictionary. Draw trees deeper than `max_draw_depth` are rejected.
    pub(crate) fn parse(f: &Fields<'_>, max_draw_depth: usize) -> MovingImagesResult<Self> {
        let verb = f
            .opt_str("command")
            .map_err(|_| MovingImagesError::invalid_command("'command' must be a string"))?
            .ok_or_else(|| MovingImagesError::invalid_command("missing 'command'"))?;
        Ok(match verb {
            "create" => Self::Create {
                name: f.opt_str("objectname")?.map(str::to_owned),
                kind: CreateKind::parse(f)?,
            },
            "close" => Self::Close(receiver(f)?),
            "closeall" => Self::CloseAll(f.opt_str("objecttype")?.map(str::parse::<ObjectType>).transpose()?),
            "getproperty" => Self::GetProperty {
                receiver: opt_receiver(f)?,
                query: PropertyQuery::parse(f)?,
            },
            "setproperty" => Self::SetProperty {
                receiver: receiver(f)?,
                track: TrackSelector::parse_key(f, "track")?,
                setting: Setting::parse(f)?,
            },
            "getproperties" => Self::GetProperties {
                receiver: receiver(f)?,
                track: TrackSelector::parse_key(f, "track")?,
                save_as: DataType::parse(f.opt_str("saveresultstype")?)?,
            },
            "drawelement" => Self::DrawElement {
                receiver: receiver(f)?,
                element: parse_element(&f.nested("drawinstructions")?, 0, max_draw_depth)?,
            },
            "getpixeldata" => Self::GetPixelData {
                receiver: receiver(f)?,
                rect: f.rect("propertyvalue")?,
            },
            "assignimagetocollection" => match opt_receiver(f)? {
                Some(receiver) => Self::AssignImage {
                    receiver,
                    identifier: f.str("imageidentifier")?.to_owned(),
                    grab: FrameGrab::parse(f)?,
                },
                // No receiver: the image comes straight from a file.
                None => Self::LoadImage {
                    path: file_path(f)?,
                    identifier: f.str("imageidentifier")?.to_owned(),
                },
            },
            "removeimagefromcollection" => Self::RemoveImage(f.str("imageidentifier")?.to_owned()),
            "export" => Self::Export {
                receiver: receiver(f)?,
                target: ExportTarget {
                    path: file_path(f)?,
                    file_type: f.str("utifiletype")?.to_owned(),
                    preset: f.opt_str("exportpreset")?.map(str::to_owned),
                    quality: f.opt_f64("exportcompressionquality")?,
                },
            },
            "createtrack" => Self::CreateTrack {
                receiver: receiver(f)?,
                media_type: f.opt_str("mediatype")?.unwrap_or("vide").to_owned(),
                track_id: f
                    .opt_u64("trackid")?
                    .map(|id| {
                        u32::try_from(id).map_err(|_| {
                            MovingImagesError::invalid_parameter(format!("invalid track id {id}"))
                        })
                    })
                    .transpose()?,
            },
            "inserttracksegment" => Self::InsertSegment {
                receiver: receiver(f)?,
                insert: SegmentInsert {
                    track: required_track(f, "track")?,
                    source: parse_selector(&f.nested("sourceobject")?)?,
                    source_track: required_track(f, "sourcetrack")?,
                    source_range: f.time_range("sourcetimerange")?,
                    insertion_time: f.time("insertiontime")?,
                    passthru: f.bool_or("addpassthruinstruction", false)?,
                },
            },
            "insertemptytracksegment" => Self::InsertEmptySegment {
                receiver: receiver(f)?,
                track: required_track(f, "track")?,
                range: f.time_range("timerange")?,
            },
            "addmovieinstruction" => Self::AddInstruction {
                receiver: receiver(f)?,
                instruction: MovieInstruction::parse(f)?,
            },
            "addinputtowriter" => {
                let (width, height) = pixel_size(f.size("size")?, "writer input")?;
                Self::AddWriterInput {
                    receiver: receiver(f)?,
                    input: WriterInput {
                        preset: f.str("preset")?.parse::<WriterPreset>()?,
                        width,
                        height,
                        frame_duration: f.time("frameduration")?,
                    },
                }
            }
            "addimagesampletowriter" => Self::AddImageSample {
                receiver: receiver(f)?,
                sample: ImageSample {
                    source: parse_image_ref(f)?,
                    time: f.opt_time("frametime")?,
                    duration_key: f.opt_str("lastaccessedframedurationkey")?.map(str::to_owned),
                },
            },
            "finishwritingframes" => Self::FinishWriting(receiver(f)?),
            "cancelwritingframes" => Self::CancelWriting(receiver(f)?),
            "processframes" => Self::ProcessFrames {
                receiver: receiver(f)?,
                process: ProcessFrames::parse(f)?,
            },
            other => {
                return Err(MovingImagesError::invalid_command(format!(
                    "unknown command '{other}'"
                )));
            }
        })
    }

    /// Wire verb, for logs.
    pub(crate) fn verb(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Close(_) => "close",
            Self::CloseAll(_) => "closeall",
            Self::GetProperty { .. } => "getproperty",
            Self::SetProperty { .. } => "setproperty",
            Self::GetProperties { .. } => "getproperties",
            Self::DrawElement { .. } => "drawelement",
            Self::GetPixelData { .. } => "getpixeldata",
            Self::AssignImage { .. } | Self::LoadImage { .. } => "assignimagetocollection",
            Self::RemoveImage(_) => "removeimagefromcollection",
            Self::Export { .. } => "export",
            Self::CreateTrack { .. } => "createtrack",
            Self::InsertSegment { .. } => "inserttracksegment",
            Self::InsertEmptySegment { .. } => "insertemptytracksegment",
            Self::AddInstruction { .. } => "addmovieinstruction",
            Self::AddWriterInput { .. } => "addinputtowriter",
            Self::AddImageSample { .. } => "addimagesampletowriter",
            Self::FinishWriting(_) => "finishwritingframes",
            Self::CancelWriting(_) => "cancelwritingframes",
            Self::ProcessFrames { .. } => "processframes",
        }
    }
}

fn required_track(f: &Fields<'_>, key: &str) -> MovingImagesResult<TrackSelector> {
    TrackSelector::parse_key(f, key)?
        .ok_or_else(|| MovingImagesError::invalid_parameter(format!("missing '{key}'")))
}

#[cfg(test)]
#[path = "../../tests/unit/protocol/command.rs"]
mod tests;
